//! # Port Specification
//!
//! Parses the `--ports` argument into a sorted, duplicate-free set.
//!
//! Supported formats:
//! * A single port (e.g., `22`).
//! * An inclusive range (e.g., `1-1024`).
//! * A comma-separated mix of both (e.g., `22, 80-90, 443`).

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::NexaError;

/// An ordered set of TCP ports to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSet {
    ports: Vec<u16>,
}

impl PortSet {
    /// Builds a set from arbitrary ports, sorting and removing duplicates.
    pub fn from_ports(ports: impl IntoIterator<Item = u16>) -> Result<Self, NexaError> {
        let mut ports: Vec<u16> = ports.into_iter().collect();
        if let Some(zero) = ports.iter().find(|p| **p == 0) {
            return Err(NexaError::InvalidPortSpec(format!("port {zero} is out of range")));
        }
        ports.sort_unstable();
        ports.dedup();
        if ports.is_empty() {
            return Err(NexaError::InvalidPortSpec("no ports given".into()));
        }
        Ok(Self { ports })
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.ports
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.binary_search(&port).is_ok()
    }

    /// Collapses consecutive ports back into ranges (`22,80-90`).
    fn ranges(&self) -> Vec<RangeInclusive<u16>> {
        let mut ranges: Vec<RangeInclusive<u16>> = Vec::new();
        for &port in &self.ports {
            match ranges.last_mut() {
                Some(last) if last.end().checked_add(1) == Some(port) => {
                    *last = *last.start()..=port;
                }
                _ => ranges.push(port..=port),
            }
        }
        ranges
    }
}

impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .ranges()
            .into_iter()
            .map(|range| {
                if range.start() == range.end() {
                    range.start().to_string()
                } else {
                    format!("{}-{}", range.start(), range.end())
                }
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for PortSet {
    type Err = NexaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ports: Vec<u16> = Vec::new();

        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(NexaError::InvalidPortSpec(format!("empty item in '{s}'")));
            }

            match part.split_once('-') {
                Some((start_str, end_str)) => {
                    let start = parse_port(start_str)?;
                    let end = parse_port(end_str)?;
                    if start > end {
                        return Err(NexaError::InvalidPortSpec(format!(
                            "range '{part}' is reversed"
                        )));
                    }
                    ports.extend(start..=end);
                }
                None => ports.push(parse_port(part)?),
            }
        }

        Self::from_ports(ports)
    }
}

fn parse_port(s: &str) -> Result<u16, NexaError> {
    let s = s.trim();
    let value: u32 = s
        .parse()
        .map_err(|e| NexaError::InvalidPortSpec(format!("'{s}' is not a port number: {e}")))?;

    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(NexaError::InvalidPortSpec(format!(
            "port {value} is out of range (1-65535)"
        ))),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
