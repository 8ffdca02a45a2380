use std::sync::Arc;
use std::time::{Duration, Instant};

use nexa_core::ScanPipeline;
use nexa_core::scanner::InFlight;
use tokio_util::sync::CancellationToken;

use crate::support::{self, FakeProber};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_attempts_never_exceed_limit() {
    let mut cfg = support::config("1-300");
    cfg.concurrency = 8;
    let gauge = Arc::new(InFlight::default());

    let report = ScanPipeline::new(cfg, CancellationToken::new())
        .with_prober(Arc::new(FakeProber::with_delay(Duration::from_millis(5))))
        .with_in_flight(Arc::clone(&gauge))
        .run(support::localhost())
        .await;

    assert_eq!(report.ports.len(), 300);
    assert!(gauge.peak() <= 8, "peak in-flight was {}", gauge.peak());
    assert!(gauge.peak() > 1, "probes never overlapped");
    assert_eq!(gauge.current(), 0);
}

/// 40 ports at 100 ms each with 4 workers take about a second, not four.
#[tokio::test]
async fn wall_time_follows_concurrency() {
    let mut cfg = support::config("1-40");
    cfg.concurrency = 4;

    let started = Instant::now();
    let report = ScanPipeline::new(cfg, CancellationToken::new())
        .with_prober(Arc::new(FakeProber::with_delay(Duration::from_millis(100))))
        .run(support::localhost())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(report.ports.len(), 40);
    assert!(elapsed >= Duration::from_millis(950), "too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "not concurrent: {elapsed:?}");
}

#[tokio::test]
async fn single_worker_is_sequential() {
    let mut cfg = support::config("1-10");
    cfg.concurrency = 1;
    let gauge = Arc::new(InFlight::default());

    let started = Instant::now();
    ScanPipeline::new(cfg, CancellationToken::new())
        .with_prober(Arc::new(FakeProber::with_delay(Duration::from_millis(20))))
        .with_in_flight(Arc::clone(&gauge))
        .run(support::localhost())
        .await;

    assert_eq!(gauge.peak(), 1);
    assert!(started.elapsed() >= Duration::from_millis(190));
}
