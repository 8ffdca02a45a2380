//! # Report Merger
//!
//! Pure in-memory aggregation of scanner, banner and enrichment output.
//!
//! The merger is owned by exactly one task. Producers never touch it directly,
//! they send [`MergeEvent`]s over a channel (see the pipeline in `nexa-core`),
//! which gives single-writer semantics without any locking here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{EnrichmentFragment, PortResult, PortState, ScanReport, Source};
use crate::network::target::Target;

/// A single write into the report.
#[derive(Debug, Clone)]
pub enum MergeEvent {
    Port(PortResult),
    Banner {
        port: u16,
        banner: String,
        protocol_hint: Option<String>,
    },
    /// `order` is the adapter's invocation index.
    Fragment {
        order: usize,
        fragment: EnrichmentFragment,
    },
}

#[derive(Debug)]
pub struct ReportMerger {
    target: Target,
    started_at: DateTime<Utc>,
    ports: BTreeMap<u16, PortResult>,
    fragments: BTreeMap<usize, EnrichmentFragment>,
    slots: BTreeMap<Source, usize>,
}

impl ReportMerger {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            started_at: Utc::now(),
            ports: BTreeMap::new(),
            fragments: BTreeMap::new(),
            slots: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, event: MergeEvent) {
        match event {
            MergeEvent::Port(result) => self.add_port(result),
            MergeEvent::Banner {
                port,
                banner,
                protocol_hint,
            } => self.set_banner(port, banner, protocol_hint),
            MergeEvent::Fragment { order, fragment } => self.add_fragment(order, fragment),
        }
    }

    /// Records a port classification. A port is only ever classified once per
    /// run, a repeated port keeps its first result.
    pub fn add_port(&mut self, result: PortResult) {
        if let Some(existing) = self.ports.get(&result.port) {
            debug!(
                "port {} already recorded as {}, ignoring {}",
                result.port, existing.state, result.state
            );
            return;
        }
        self.ports.insert(result.port, result);
    }

    /// Attaches a banner to a port already recorded as OPEN.
    pub fn set_banner(&mut self, port: u16, banner: String, protocol_hint: Option<String>) {
        match self.ports.get_mut(&port) {
            Some(result) if result.state == PortState::Open => {
                result.banner = Some(banner);
                if protocol_hint.is_some() {
                    result.protocol_hint = protocol_hint;
                }
            }
            _ => debug!("dropping banner for port {port}, not recorded as open"),
        }
    }

    /// Adds a fragment. A later fragment from the same source replaces the
    /// earlier one in the earlier one's slot.
    pub fn add_fragment(&mut self, order: usize, fragment: EnrichmentFragment) {
        let slot = *self.slots.entry(fragment.source).or_insert(order);
        self.fragments.insert(slot, fragment);
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn finish(self, complete: bool) -> ScanReport {
        ScanReport {
            target: self.target,
            started_at: self.started_at,
            finished_at: Utc::now(),
            complete,
            ports: self.ports.into_values().collect(),
            enrichment: self.fragments.into_values().collect(),
            narrative: None,
        }
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
