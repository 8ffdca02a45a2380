//! WHOIS (RFC 3912) request framing and light response parsing.
//!
//! Responses are free-form `key: value` text whose keys differ between
//! registries. We pick out a handful of commonly useful keys and keep the raw
//! text alongside.

use std::collections::BTreeMap;

pub const WHOIS_PORT: u16 = 43;
pub const IANA_SERVER: &str = "whois.iana.org";

/// Canonical field name and the registry spellings that map onto it.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("registrar", &["registrar", "sponsoring registrar"]),
    ("org", &["org", "organisation", "organization", "orgname", "registrant organization", "owner"]),
    ("country", &["country", "registrant country"]),
    ("netname", &["netname", "net-name"]),
    ("netrange", &["netrange", "inetnum", "inet6num", "cidr"]),
    ("origin", &["origin", "originas"]),
    ("created", &["created", "creation date", "regdate"]),
    ("expires", &["registry expiry date", "expiration date", "registrar registration expiration date", "expires"]),
    ("name_servers", &["name server", "nserver"]),
];

pub fn request(query: &str) -> Vec<u8> {
    format!("{query}\r\n").into_bytes()
}

/// The server a response refers the query on to, if any.
pub fn referral(response: &str) -> Option<String> {
    key_values(response).find_map(|(key, value)| {
        matches!(key.as_str(), "refer" | "whois" | "registrar whois server")
            .then(|| strip_scheme(value).to_string())
            .filter(|server| !server.is_empty())
    })
}

/// Extracts the well-known fields. Repeated keys are joined with `, `.
pub fn extract_fields(response: &str) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (key, value) in key_values(response) {
        let Some((canonical, _)) = FIELD_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&key.as_str()))
        else {
            continue;
        };

        let values = fields.entry(canonical.to_string()).or_default();
        let value = value.to_string();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    fields
        .into_iter()
        .map(|(key, values)| (key, values.join(", ")))
        .collect()
}

/// Lower-cased `key: value` pairs, skipping comments and empty values.
fn key_values(response: &str) -> impl Iterator<Item = (String, &str)> {
    response.lines().filter_map(|line| {
        let line = line.trim();
        if line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>") {
            return None;
        }
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some((key.trim().to_ascii_lowercase(), value))
    })
}

fn strip_scheme(server: &str) -> &str {
    server
        .trim()
        .trim_start_matches("whois://")
        .trim_end_matches('/')
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
