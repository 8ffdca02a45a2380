//! # Error Taxonomy
//!
//! Only [`NexaError`] ever aborts a run. Adapter and process failures are
//! absorbed into the report as fragment statuses.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Fatal errors. Any of these halts the scan with a non-zero exit.
#[derive(Debug, Error)]
pub enum NexaError {
    #[error("failed to resolve target '{host}': {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("target '{0}' did not resolve to any address")]
    NoAddress(String),

    #[error("invalid port specification: {0}")]
    InvalidPortSpec(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why an enrichment adapter produced no usable data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The capability is missing, unauthorized or not applicable to this target.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The capability ran and failed.
    #[error("failed: {0}")]
    Failed(String),
}

impl AdapterError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

impl From<ProcessError> for AdapterError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound(_) | ProcessError::Cancelled => {
                AdapterError::Unavailable(err.to_string())
            }
            _ => AdapterError::Failed(err.to_string()),
        }
    }
}

/// Failures of a guarded external-process call.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("executable '{0}' not found")]
    NotFound(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error("'{program}' exited with status {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("i/o error while talking to child process: {0}")]
    Io(#[from] io::Error),
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
