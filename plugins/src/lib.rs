//! Enrichment adapters.
//!
//! Each adapter implements [`Enricher`] and turns one external data source
//! into an [`EnrichmentFragment`](nexa_common::report::EnrichmentFragment).

pub mod deepscan;
pub mod dns;
pub mod http;
pub mod whois;

use tokio_util::sync::CancellationToken;

use nexa_common::{config::Config, enrichment::Enricher};

use crate::{deepscan::NmapEnricher, dns::DnsEnricher, http::HttpEnricher, whois::WhoisEnricher};

/// The adapters of a regular run, in report order.
pub fn default_enrichers(cfg: &Config, cancel: &CancellationToken) -> Vec<Box<dyn Enricher>> {
    let mut enrichers: Vec<Box<dyn Enricher>> = Vec::new();

    if cfg.deep_scan {
        enrichers.push(Box::new(NmapEnricher::new(
            cfg.ports.clone(),
            cfg.deep_scan_timeout,
            cancel.child_token(),
        )));
    }
    enrichers.push(Box::new(WhoisEnricher::new(cfg.enrich_timeout)));
    enrichers.push(Box::new(DnsEnricher::from_system(cfg.enrich_timeout)));
    enrichers.push(Box::new(HttpEnricher::new(cfg.enrich_timeout)));

    enrichers
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
