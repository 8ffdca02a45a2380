//! The extension point for contextual data sources.
//!
//! High-level code depends only on [`Enricher`]. New sources plug in by
//! implementing it, the merger never needs to know about them.

use std::time::Duration;

use async_trait::async_trait;

use crate::network::target::Target;
use crate::report::{EnrichmentFragment, Source};

/// When an adapter can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Needs only the target, runs alongside the port scan.
    WithScan,
    /// Needs the confirmed-open ports, runs once the scan has finished.
    AfterScan,
}

#[async_trait]
pub trait Enricher: Send + Sync {
    fn source(&self) -> Source;

    fn phase(&self) -> Phase {
        Phase::WithScan
    }

    /// Budget the pipeline grants this adapter before recording an ERROR.
    fn timeout(&self) -> Duration;

    /// Produces exactly one fragment. Failures are reported through the
    /// fragment's status, never by panicking or erroring out.
    ///
    /// `open_ports` is empty for [`Phase::WithScan`] adapters.
    async fn enrich(&self, target: &Target, open_ports: &[u16]) -> EnrichmentFragment;
}
