//! # Nexa Common
//!
//! Shared vocabulary of the workspace: the scan target, the port set, the
//! report model and its merger, run configuration, the error taxonomy and the
//! [`enrichment::Enricher`] extension point.

pub mod config;
pub mod enrichment;
pub mod error;
pub mod network;
pub mod report;
pub mod utils;
