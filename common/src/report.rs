//! # Report Model
//!
//! The canonical structures a scan accumulates: one [`PortResult`] per attempted
//! port, one [`EnrichmentFragment`] per adapter, wrapped into a [`ScanReport`].
//!
//! Assembly happens in [`merger::ReportMerger`]; everything here is plain data
//! plus read-only views used by the presentation layer and the emitter.

pub mod merger;

pub use merger::{MergeEvent, ReportMerger};

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::network::target::Target;

/// Longest banner excerpt shown in the merged port view.
pub const VERSION_COLUMN_WIDTH: usize = 120;

pub const UNKNOWN_SERVICE: &str = "(unknown)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortState {
    /// The connection was accepted.
    Open,
    /// The connection was actively refused.
    Closed,
    /// Timed out, unreachable or reset.
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PortState::Open => "OPEN",
            PortState::Closed => "CLOSED",
            PortState::Filtered => "FILTERED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortResult {
    pub port: u16,
    pub state: PortState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Best guess of the service speaking on this port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_hint: Option<String>,
}

impl PortResult {
    pub fn new(port: u16, state: PortState) -> Self {
        Self {
            port,
            state,
            banner: None,
            protocol_hint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    DeepScan,
    Whois,
    Dns,
    Http,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Source::DeepScan => "DEEPSCAN",
            Source::Whois => "WHOIS",
            Source::Dns => "DNS",
            Source::Http => "HTTP",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FragmentStatus {
    Ok,
    Unavailable,
    Error,
}

impl fmt::Display for FragmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FragmentStatus::Ok => "OK",
            FragmentStatus::Unavailable => "UNAVAILABLE",
            FragmentStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Adapter output. Opaque to the merger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Empty,
    Fields(BTreeMap<String, String>),
    Text(String),
}

impl Payload {
    pub fn field(&self, key: &str) -> Option<&str> {
        match self {
            Payload::Fields(fields) => fields.get(key).map(String::as_str),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentFragment {
    pub source: Source,
    pub status: FragmentStatus,
    pub payload: Payload,
    /// Why the fragment is not OK.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl EnrichmentFragment {
    pub fn ok(source: Source, payload: Payload) -> Self {
        Self {
            source,
            status: FragmentStatus::Ok,
            payload,
            detail: None,
        }
    }

    pub fn unavailable(source: Source, detail: impl Into<String>) -> Self {
        Self {
            source,
            status: FragmentStatus::Unavailable,
            payload: Payload::Empty,
            detail: Some(detail.into()),
        }
    }

    pub fn error(source: Source, detail: impl Into<String>) -> Self {
        Self {
            source,
            status: FragmentStatus::Error,
            payload: Payload::Empty,
            detail: Some(detail.into()),
        }
    }

    /// Folds an adapter outcome into a fragment.
    pub fn from_result(source: Source, result: Result<Payload, crate::error::AdapterError>) -> Self {
        use crate::error::AdapterError;
        match result {
            Ok(payload) => Self::ok(source, payload),
            Err(AdapterError::Unavailable(reason)) => Self::unavailable(source, reason),
            Err(AdapterError::Failed(reason)) => Self::error(source, reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FragmentStatus::Ok
    }
}

/// The merged result of one scan invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub target: Target,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// False when the run was cancelled before every port was classified.
    pub complete: bool,
    /// Ascending by port number, one entry per attempted port.
    pub ports: Vec<PortResult>,
    /// In adapter invocation order.
    pub enrichment: Vec<EnrichmentFragment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// One line of the merged port view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRow {
    pub port: u16,
    pub state: PortState,
    pub service: String,
    pub version: String,
}

impl PortRow {
    /// Filtered ports are only worth showing when something identified a service.
    pub fn is_relevant(&self) -> bool {
        match self.state {
            PortState::Open => true,
            PortState::Filtered => !self.service.is_empty() && self.service != UNKNOWN_SERVICE,
            PortState::Closed => false,
        }
    }
}

impl ScanReport {
    pub fn fragment(&self, source: Source) -> Option<&EnrichmentFragment> {
        self.enrichment.iter().find(|f| f.source == source)
    }

    pub fn open_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports
            .iter()
            .filter(|p| p.state == PortState::Open)
            .map(|p| p.port)
    }

    pub fn count(&self, state: PortState) -> usize {
        self.ports.iter().filter(|p| p.state == state).count()
    }

    /// Joins port results with the deep-scan service data.
    pub fn rows(&self) -> Vec<PortRow> {
        let deep_scan = self
            .fragment(Source::DeepScan)
            .filter(|f| f.is_ok())
            .map(|f| &f.payload);

        self.ports
            .iter()
            .map(|result| {
                let service = deep_scan
                    .and_then(|payload| payload.field(&service_key(result.port)))
                    .map(str::to_string)
                    .or_else(|| result.protocol_hint.clone())
                    .unwrap_or_default();

                let version = result
                    .banner
                    .as_deref()
                    .map(|b| b.chars().take(VERSION_COLUMN_WIDTH).collect())
                    .unwrap_or_default();

                PortRow {
                    port: result.port,
                    state: result.state,
                    service,
                    version,
                }
            })
            .collect()
    }

    /// OPEN rows plus FILTERED rows with an identified service.
    pub fn summary_rows(&self) -> Vec<PortRow> {
        self.rows().into_iter().filter(PortRow::is_relevant).collect()
    }
}

/// Deep-scan payload key holding the service description of `port`.
pub fn service_key(port: u16) -> String {
    format!("service.{port}")
}

/// Deep-scan payload key holding the state reported for `port`.
pub fn state_key(port: u16) -> String {
    format!("state.{port}")
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
