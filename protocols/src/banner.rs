//! Service banner probes and banner text handling.
//!
//! Most line-based services (SSH, FTP, SMTP, POP3, IMAP) greet the client on
//! their own, so the grabber only reads. HTTP servers stay silent until they
//! receive a request, those ports get a minimal `GET`.

/// Upper bound on bytes read from a service.
pub const MAX_BANNER_BYTES: usize = 4096;

const HTTP_PORTS: &[u16] = &[80, 443, 8000, 8080, 8443, 8888];

/// What to send after connecting to `port`. `None` means read passively.
pub fn probe_for(port: u16, host: &str) -> Option<Vec<u8>> {
    if HTTP_PORTS.contains(&port) {
        return Some(http_request(host));
    }
    None
}

pub fn http_request(host: &str) -> Vec<u8> {
    format!("GET / HTTP/1.0\r\nHost: {host}\r\n\r\n").into_bytes()
}

/// Service name IANA assigns to commonly scanned ports.
pub fn well_known_service(port: u16) -> Option<&'static str> {
    let name = match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 | 587 => "smtp",
        53 => "domain",
        80 | 8000 | 8080 | 8888 => "http",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        139 => "netbios-ssn",
        143 => "imap",
        443 | 8443 => "https",
        445 => "microsoft-ds",
        465 => "smtps",
        993 => "imaps",
        995 => "pop3s",
        1433 => "ms-sql-s",
        3306 => "mysql",
        3389 => "ms-wbt-server",
        5432 => "postgresql",
        5900 => "vnc",
        6379 => "redis",
        _ => return None,
    };
    Some(name)
}

/// Turns raw service output into a single printable line.
///
/// CR and LF become spaces, other control characters are dropped and runs of
/// whitespace collapse. Returns `None` when nothing printable is left.
pub fn normalize(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_BANNER_BYTES)]);

    let cleaned: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' || c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();

    let collapsed: String = cleaned.split_whitespace().collect::<Vec<&str>>().join(" ");

    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Guesses the protocol from what the service said.
pub fn classify(banner: &str) -> Option<&'static str> {
    let upper = banner.to_ascii_uppercase();

    if upper.starts_with("SSH-") {
        return Some("ssh");
    }
    if upper.starts_with("HTTP/") {
        return Some("http");
    }
    if upper.starts_with("+OK") {
        return Some("pop3");
    }
    if upper.starts_with("* OK") {
        return Some("imap");
    }
    if upper.starts_with("220") {
        if upper.contains("FTP") {
            return Some("ftp");
        }
        if upper.contains("SMTP") || upper.contains("ESMTP") || upper.contains("MAIL") {
            return Some("smtp");
        }
    }
    if upper.starts_with("RFB ") {
        return Some("vnc");
    }
    if upper.starts_with("-ERR") || upper.starts_with("-NOAUTH") {
        return Some("redis");
    }
    if upper.contains("MYSQL") || upper.contains("MARIADB") {
        return Some("mysql");
    }
    None
}

/// Banner-derived hint, falling back to the port's well-known service.
pub fn protocol_hint(port: u16, banner: Option<&str>) -> Option<&'static str> {
    banner
        .and_then(classify)
        .or_else(|| well_known_service(port))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
