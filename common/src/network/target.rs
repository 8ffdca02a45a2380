//! # Scan Target Model
//!
//! Resolves the user's host input into the single canonical target of a run.
//!
//! The input can be:
//! * A literal IPv4 or IPv6 address.
//! * A hostname, resolved through the system resolver (IPv4 preferred).

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::Serialize;
use tracing::debug;

use crate::error::NexaError;

/// The host being scanned. Created once at scan start and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// What the user typed.
    pub input: String,
    pub ip: IpAddr,
    /// Set when the input was a name rather than an address.
    pub hostname: Option<String>,
}

impl Target {
    /// Builds a target for an already known address.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self {
            input: ip.to_string(),
            ip,
            hostname: None,
        }
    }

    /// Resolves `input` into a [`Target`].
    ///
    /// A failed lookup is fatal and must be reported before any probing starts.
    pub async fn resolve(input: &str) -> Result<Self, NexaError> {
        let input = input.trim();

        if let Some(ip) = parse_host(input) {
            return Ok(Self::from_ip(ip));
        }

        if input.is_empty() {
            return Err(NexaError::NoAddress(input.to_string()));
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((input, 0))
            .await
            .map_err(|source| NexaError::Resolution {
                host: input.to_string(),
                source,
            })?
            .collect();

        let ip = select_address(addrs.iter().map(SocketAddr::ip))
            .ok_or_else(|| NexaError::NoAddress(input.to_string()))?;

        debug!("{input} resolved to {ip} ({} candidates)", addrs.len());

        Ok(Self {
            input: input.to_string(),
            ip,
            hostname: Some(input.trim_end_matches('.').to_ascii_lowercase()),
        })
    }

    /// The name used for registration lookups: the hostname without a leading
    /// `www.` when one exists, otherwise the address.
    pub fn query_name(&self) -> String {
        match &self.hostname {
            Some(name) => name.strip_prefix("www.").unwrap_or(name).to_string(),
            None => self.ip.to_string(),
        }
    }

    /// Host component of a URL pointing at this target.
    pub fn url_host(&self) -> String {
        match (&self.hostname, self.ip) {
            (Some(name), _) => name.clone(),
            (None, IpAddr::V6(v6)) => format!("[{v6}]"),
            (None, IpAddr::V4(v4)) => v4.to_string(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hostname {
            Some(name) => write!(f, "{name} ({})", self.ip),
            None => write!(f, "{}", self.ip),
        }
    }
}

/// Parses a literal address, accepting the bracketed IPv6 form.
fn parse_host(s: &str) -> Option<IpAddr> {
    let unbracketed = s
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(s);
    unbracketed.parse::<IpAddr>().ok()
}

/// Prefers the first IPv4 address, falling back to the first of any family.
fn select_address(mut candidates: impl Iterator<Item = IpAddr> + Clone) -> Option<IpAddr> {
    candidates
        .clone()
        .find(IpAddr::is_ipv4)
        .or_else(|| candidates.next())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
