//! The central **abstraction** for port scanning.
//!
//! [`PortScanner`] owns scheduling only: how many attempts may be in flight,
//! when to stop, and where results go. The socket work sits behind the
//! [`Prober`] trait, and banner reads are handed to the [`BannerGrabber`].
//!
//! **Architectural Note:**
//! The scanner never touches the report. Every classification is sent as a
//! [`MergeEvent`] to the single task that owns the merger.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nexa_common::network::ports::PortSet;
use nexa_common::report::{MergeEvent, PortResult, PortState};
use nexa_protocols::banner::well_known_service;
use tokio::sync::{Semaphore, mpsc::UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::banner::BannerGrabber;
use crate::network::tcp::Prober;

pub type ProgressCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Counts connection attempts currently in flight and remembers the peak.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What the scan phase leaves behind for the rest of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Every requested port was classified.
    pub complete: bool,
    pub scanned: usize,
    /// Ascending.
    pub open_ports: Vec<u16>,
}

pub struct PortScanner {
    prober: Arc<dyn Prober>,
    concurrency: usize,
    connect_timeout: Duration,
    banners: Option<BannerGrabber>,
    in_flight: Arc<InFlight>,
    on_port_scanned: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl PortScanner {
    pub fn new(
        prober: Arc<dyn Prober>,
        concurrency: usize,
        connect_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            prober,
            concurrency: concurrency.max(1),
            connect_timeout,
            banners: None,
            in_flight: Arc::new(InFlight::default()),
            on_port_scanned: None,
            cancel,
        }
    }

    pub fn with_banner_grabber(mut self, grabber: BannerGrabber) -> Self {
        self.banners = Some(grabber);
        self
    }

    /// Records into an existing gauge instead of a private one.
    pub fn with_in_flight(mut self, gauge: Arc<InFlight>) -> Self {
        self.in_flight = gauge;
        self
    }

    /// Called with the running count of classified ports.
    pub fn on_port_scanned(mut self, callback: ProgressCallback) -> Self {
        self.on_port_scanned = Some(callback);
        self
    }

    pub fn in_flight(&self) -> Arc<InFlight> {
        Arc::clone(&self.in_flight)
    }

    /// Probes every port of `ports` on `ip`, at most `concurrency` at a time.
    ///
    /// Returns once every started probe and banner grab has finished. Ports that
    /// were never attempted because of cancellation produce no event.
    pub async fn scan(
        &self,
        ip: IpAddr,
        ports: &PortSet,
        events: &UnboundedSender<MergeEvent>,
    ) -> ScanSummary {
        info!(
            "Scanning {} ports on {ip} ({} concurrent, {:?} timeout)",
            ports.len(),
            self.concurrency,
            self.connect_timeout
        );

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let scanned = Arc::new(AtomicUsize::new(0));
        let mut probes: JoinSet<Option<(u16, PortState)>> = JoinSet::new();
        let mut summary = ScanSummary {
            complete: true,
            ..ScanSummary::default()
        };

        for port in ports.iter() {
            // Taken before the task exists and released once the connect
            // settles: at most `concurrency` connect attempts are in flight.
            // Banner grabs that follow hold a permit from their own pool.
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    summary.complete = false;
                    break;
                }
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_closed) => {
                        summary.complete = false;
                        break;
                    }
                },
            };

            let prober = Arc::clone(&self.prober);
            let in_flight = Arc::clone(&self.in_flight);
            let cancel = self.cancel.clone();
            let banners = self.banners.clone();
            let events = events.clone();
            let scanned = Arc::clone(&scanned);
            let callback = self.on_port_scanned.clone();
            let connect_timeout = self.connect_timeout;

            probes.spawn(async move {
                let addr = SocketAddr::new(ip, port);
                let probe = {
                    let _permit = permit;
                    let _gauge = in_flight.enter();
                    tokio::select! {
                        probe = prober.probe(addr, connect_timeout) => probe,
                        _ = cancel.cancelled() => return None,
                    }
                };

                let state = probe.state;
                let mut result = PortResult::new(port, state);
                if state == PortState::Open {
                    result.protocol_hint = well_known_service(port).map(str::to_string);
                }
                if events.send(MergeEvent::Port(result)).is_err() {
                    debug!("report collector gone, dropping port {port}");
                    return None;
                }

                let count = scanned.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(cb) = &callback {
                    cb(count);
                }

                if let (Some(grabber), Some(stream)) = (banners, probe.stream)
                    && let Some(banner) = grabber.grab(port, stream).await
                {
                    let event = MergeEvent::Banner {
                        port,
                        banner: banner.text,
                        protocol_hint: banner.protocol_hint,
                    };
                    if events.send(event).is_err() {
                        debug!("report collector gone, dropping banner for port {port}");
                    }
                }

                Some((port, state))
            });

            while let Some(finished) = probes.try_join_next() {
                summary.record(finished);
            }
        }

        while let Some(finished) = probes.join_next().await {
            summary.record(finished);
        }

        summary.scanned = scanned.load(Ordering::SeqCst);
        if self.cancel.is_cancelled() || summary.scanned < ports.len() {
            summary.complete = false;
        }
        summary.open_ports.sort_unstable();

        info!(
            "Scan finished: {} of {} ports classified, {} open",
            summary.scanned,
            ports.len(),
            summary.open_ports.len()
        );
        summary
    }
}

impl ScanSummary {
    fn record(&mut self, finished: Result<Option<(u16, PortState)>, tokio::task::JoinError>) {
        match finished {
            Ok(Some((port, PortState::Open))) => self.open_ports.push(port),
            Ok(Some(_)) => {}
            Ok(None) => self.complete = false,
            Err(e) => {
                debug!("probe task failed: {e}");
                self.complete = false;
            }
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
