//! # Scan Pipeline
//!
//! Implements the core "scan one target" use case.
//!
//! Orchestrates the run by:
//! 1. starting the collector task that owns the [`ReportMerger`],
//! 2. launching the [`Phase::WithScan`] adapters next to the port scan,
//! 3. running the port scan (banners included),
//! 4. launching the [`Phase::AfterScan`] adapters with the open ports,
//! 5. closing the channel and turning the merger into a [`ScanReport`].

use std::sync::Arc;

use nexa_common::config::Config;
use nexa_common::enrichment::{Enricher, Phase};
use nexa_common::network::target::Target;
use nexa_common::report::{EnrichmentFragment, MergeEvent, ReportMerger, ScanReport};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::banner::BannerGrabber;
use crate::network::tcp::{Prober, TcpProber};
use crate::scanner::{InFlight, PortScanner, ProgressCallback};

/// Application service for a single-target scan.
pub struct ScanPipeline {
    config: Config,
    prober: Arc<dyn Prober>,
    enrichers: Vec<Arc<dyn Enricher>>,
    on_port_scanned: Option<ProgressCallback>,
    in_flight: Option<Arc<InFlight>>,
    cancel: CancellationToken,
}

struct Launched {
    order: usize,
    enricher: Arc<dyn Enricher>,
    handle: JoinHandle<()>,
}

impl ScanPipeline {
    pub fn new(config: Config, cancel: CancellationToken) -> Self {
        Self {
            config,
            prober: Arc::new(TcpProber),
            enrichers: Vec::new(),
            on_port_scanned: None,
            in_flight: None,
            cancel,
        }
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    /// Registers the adapters. Fragment order in the report follows this order.
    pub fn with_enrichers(mut self, enrichers: Vec<Box<dyn Enricher>>) -> Self {
        self.enrichers = enrichers.into_iter().map(Arc::from).collect();
        self
    }

    pub fn on_port_scanned(mut self, callback: ProgressCallback) -> Self {
        self.on_port_scanned = Some(callback);
        self
    }

    /// Shares the scanner's in-flight gauge with the caller.
    pub fn with_in_flight(mut self, gauge: Arc<InFlight>) -> Self {
        self.in_flight = Some(gauge);
        self
    }

    /// Runs the whole scan. Cancellation ends it early with a partial report,
    /// never with an error.
    pub async fn run(self, target: Target) -> ScanReport {
        let target = Arc::new(target);
        let (events, mut inbox) = mpsc::unbounded_channel::<MergeEvent>();

        let collector_target = (*target).clone();
        let collector = tokio::spawn(async move {
            let mut merger = ReportMerger::new(collector_target);
            while let Some(event) = inbox.recv().await {
                merger.apply(event);
            }
            merger
        });

        let mut launched: Vec<Launched> = Vec::new();
        let no_ports: Arc<[u16]> = Arc::from(Vec::new());

        for (order, enricher) in self.enrichers.iter().enumerate() {
            if enricher.phase() == Phase::WithScan {
                launched.push(self.launch(order, enricher, &target, &no_ports, &events));
            }
        }

        let summary = self.port_scanner(&target).scan(target.ip, &self.config.ports, &events).await;

        let open_ports: Arc<[u16]> = Arc::from(summary.open_ports.clone());
        for (order, enricher) in self.enrichers.iter().enumerate() {
            if enricher.phase() == Phase::AfterScan {
                launched.push(self.launch(order, enricher, &target, &open_ports, &events));
            }
        }

        for Launched {
            order,
            enricher,
            handle,
        } in launched
        {
            if let Err(e) = handle.await {
                warn!("{} adapter crashed", enricher.source());
                debug!("{} adapter join error: {e}", enricher.source());
                let fragment = EnrichmentFragment::error(enricher.source(), format!("adapter crashed: {e}"));
                if events.send(MergeEvent::Fragment { order, fragment }).is_err() {
                    warn!("report collector gone, dropping {} fragment", enricher.source());
                }
            }
        }

        drop(events);
        let complete = summary.complete && !self.cancel.is_cancelled();
        let report = match collector.await {
            Ok(merger) => merger.finish(complete),
            Err(e) => {
                // Without the merger nothing survives but the target.
                warn!("report collector failed: {e}");
                ReportMerger::new((*target).clone()).finish(false)
            }
        };

        info!(
            "Report assembled: {} ports, {} enrichment fragments{}",
            report.ports.len(),
            report.enrichment.len(),
            if report.complete { "" } else { " (partial)" }
        );
        report
    }

    fn port_scanner(&self, target: &Target) -> PortScanner {
        let host = target.hostname.clone().unwrap_or_else(|| target.url_host());
        let grabber = BannerGrabber::new(
            host,
            self.config.banner_timeout(),
            self.config.concurrency,
            self.cancel.clone(),
        );

        let mut scanner = PortScanner::new(
            Arc::clone(&self.prober),
            self.config.concurrency,
            self.config.connect_timeout,
            self.cancel.clone(),
        )
        .with_banner_grabber(grabber);
        if let Some(gauge) = &self.in_flight {
            scanner = scanner.with_in_flight(Arc::clone(gauge));
        }
        if let Some(callback) = &self.on_port_scanned {
            scanner = scanner.on_port_scanned(Arc::clone(callback));
        }
        scanner
    }

    /// Spawns one adapter under its timeout and the global cancellation.
    fn launch(
        &self,
        order: usize,
        enricher: &Arc<dyn Enricher>,
        target: &Arc<Target>,
        open_ports: &Arc<[u16]>,
        events: &UnboundedSender<MergeEvent>,
    ) -> Launched {
        let task_enricher = Arc::clone(enricher);
        let target = Arc::clone(target);
        let open_ports = Arc::clone(open_ports);
        let events = events.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let source = task_enricher.source();
            let budget = task_enricher.timeout();
            debug!("{source} adapter started (budget {budget:?})");

            let mut fragment = tokio::select! {
                biased;
                _ = cancel.cancelled() => EnrichmentFragment::unavailable(source, "cancelled"),
                outcome = tokio::time::timeout(budget, task_enricher.enrich(&target, &open_ports)) => {
                    match outcome {
                        Ok(fragment) => fragment,
                        Err(_elapsed) => EnrichmentFragment::error(
                            source,
                            format!("timed out after {:.1}s", budget.as_secs_f64()),
                        ),
                    }
                }
            };
            fragment.source = source;

            debug!("{source} adapter finished: {}", fragment.status);
            if events.send(MergeEvent::Fragment { order, fragment }).is_err() {
                warn!("report collector gone, dropping {source} fragment");
            }
        });

        Launched {
            order,
            enricher: Arc::clone(enricher),
            handle,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::tcp::Probe;
    use async_trait::async_trait;
    use nexa_common::report::{FragmentStatus, Payload, PortState, Source};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    struct ClosedEverywhere;

    #[async_trait]
    impl Prober for ClosedEverywhere {
        async fn probe(&self, addr: SocketAddr, _timeout: Duration) -> Probe {
            if addr.port() == 22 {
                Probe::classified(PortState::Open)
            } else {
                Probe::classified(PortState::Closed)
            }
        }
    }

    struct Stub {
        source: Source,
        phase: Phase,
        delay: Duration,
        budget: Duration,
    }

    impl Stub {
        fn boxed(source: Source, phase: Phase, delay: Duration) -> Box<dyn Enricher> {
            Box::new(Stub {
                source,
                phase,
                delay,
                budget: Duration::from_secs(2),
            })
        }
    }

    #[async_trait]
    impl Enricher for Stub {
        fn source(&self) -> Source {
            self.source
        }

        fn phase(&self) -> Phase {
            self.phase
        }

        fn timeout(&self) -> Duration {
            self.budget
        }

        async fn enrich(&self, _target: &Target, open_ports: &[u16]) -> EnrichmentFragment {
            tokio::time::sleep(self.delay).await;
            let ports: Vec<String> = open_ports.iter().map(u16::to_string).collect();
            EnrichmentFragment::ok(self.source, Payload::Text(ports.join(",")))
        }
    }

    fn config() -> Config {
        Config::new("20-25".parse().unwrap())
    }

    fn localhost() -> Target {
        Target::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[tokio::test]
    async fn fragments_follow_invocation_order() {
        let report = ScanPipeline::new(config(), CancellationToken::new())
            .with_prober(Arc::new(ClosedEverywhere))
            .with_enrichers(vec![
                Stub::boxed(Source::Whois, Phase::WithScan, Duration::from_millis(80)),
                Stub::boxed(Source::Dns, Phase::WithScan, Duration::ZERO),
                Stub::boxed(Source::Http, Phase::AfterScan, Duration::ZERO),
            ])
            .run(localhost())
            .await;

        let sources: Vec<Source> = report.enrichment.iter().map(|f| f.source).collect();
        assert_eq!(sources, vec![Source::Whois, Source::Dns, Source::Http]);
        assert!(report.complete);
        assert_eq!(report.ports.len(), 6);
    }

    #[tokio::test]
    async fn after_scan_adapters_see_open_ports() {
        let report = ScanPipeline::new(config(), CancellationToken::new())
            .with_prober(Arc::new(ClosedEverywhere))
            .with_enrichers(vec![Stub::boxed(Source::Http, Phase::AfterScan, Duration::ZERO)])
            .run(localhost())
            .await;

        assert_eq!(report.enrichment[0].payload, Payload::Text("22".into()));
    }

    #[tokio::test]
    async fn slow_adapter_becomes_error_fragment() {
        let slow = Box::new(Stub {
            source: Source::Whois,
            phase: Phase::WithScan,
            delay: Duration::from_secs(5),
            budget: Duration::from_millis(100),
        });
        let report = ScanPipeline::new(config(), CancellationToken::new())
            .with_prober(Arc::new(ClosedEverywhere))
            .with_enrichers(vec![slow])
            .run(localhost())
            .await;

        let fragment = report.fragment(Source::Whois).unwrap();
        assert_eq!(fragment.status, FragmentStatus::Error);
        assert!(fragment.detail.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn cancellation_marks_adapters_unavailable() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = ScanPipeline::new(config(), cancel)
            .with_prober(Arc::new(ClosedEverywhere))
            .with_enrichers(vec![Stub::boxed(Source::Dns, Phase::WithScan, Duration::from_secs(5))])
            .run(localhost())
            .await;

        assert!(!report.complete);
        assert_eq!(report.fragment(Source::Dns).unwrap().status, FragmentStatus::Unavailable);
    }
}
