//! # Nexa Core
//!
//! The scan engine: TCP connect probing, banner grabbing, the pipeline that
//! runs scanner and enrichment adapters side by side, and the report emitter.

pub mod banner;
pub mod emitter;
pub mod network;
pub mod pipeline;
pub mod scanner;

pub use emitter::{AgentOutcome, ReportEmitter};
pub use pipeline::ScanPipeline;
