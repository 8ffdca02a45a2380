use std::sync::Arc;
use std::time::{Duration, Instant};

use nexa_common::enrichment::Phase;
use nexa_common::report::{FragmentStatus, Payload, Source};
use nexa_core::ScanPipeline;
use nexa_plugins::default_enrichers;
use tokio_util::sync::CancellationToken;

use crate::support::{self, Behaviour, FakeProber, StubEnricher};

#[test]
fn no_nmap_means_no_deep_scan_adapter() {
    let cfg = support::config("1-10");
    let sources: Vec<Source> = default_enrichers(&cfg, &CancellationToken::new())
        .iter()
        .map(|e| e.source())
        .collect();
    assert!(!sources.contains(&Source::DeepScan));
    assert_eq!(sources, vec![Source::Whois, Source::Dns, Source::Http]);
}

#[tokio::test]
async fn fragments_keep_invocation_order() {
    let report = ScanPipeline::new(support::config("1-5"), CancellationToken::new())
        .with_prober(Arc::new(FakeProber::with_delay(Duration::ZERO)))
        .with_enrichers(vec![
            StubEnricher::boxed(Source::DeepScan, Duration::from_millis(150)),
            StubEnricher::boxed(Source::Whois, Duration::from_millis(75)),
            StubEnricher::boxed(Source::Dns, Duration::ZERO),
        ])
        .run(support::localhost())
        .await;

    let sources: Vec<Source> = report.enrichment.iter().map(|f| f.source).collect();
    assert_eq!(sources, vec![Source::DeepScan, Source::Whois, Source::Dns]);
}

#[tokio::test]
async fn failing_adapters_do_not_affect_others() {
    let failing = Box::new(StubEnricher {
        source: Source::Whois,
        phase: Phase::WithScan,
        delay: Duration::ZERO,
        behaviour: Behaviour::Fail,
    });
    let panicking = Box::new(StubEnricher {
        source: Source::Dns,
        phase: Phase::WithScan,
        delay: Duration::ZERO,
        behaviour: Behaviour::Panic,
    });
    let prober = FakeProber {
        open: vec![80],
        closed: vec![],
        delay: Duration::ZERO,
    };

    let report = ScanPipeline::new(support::config("79-81"), CancellationToken::new())
        .with_prober(Arc::new(prober))
        .with_enrichers(vec![
            failing,
            panicking,
            Box::new(StubEnricher {
                source: Source::Http,
                phase: Phase::AfterScan,
                delay: Duration::ZERO,
                behaviour: Behaviour::Succeed,
            }),
        ])
        .run(support::localhost())
        .await;

    assert!(report.complete);
    assert_eq!(report.ports.len(), 3);
    assert_eq!(report.fragment(Source::Whois).unwrap().status, FragmentStatus::Error);
    assert_eq!(report.fragment(Source::Dns).unwrap().status, FragmentStatus::Error);

    let http = report.fragment(Source::Http).unwrap();
    assert_eq!(http.status, FragmentStatus::Ok);
    assert_eq!(http.payload, Payload::Text("1 open".into()));
}

#[tokio::test]
async fn cancellation_yields_partial_report_promptly() {
    let mut cfg = support::config("1-200");
    cfg.concurrency = 4;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = ScanPipeline::new(cfg, cancel)
        .with_prober(Arc::new(FakeProber::with_delay(Duration::from_millis(50))))
        .with_enrichers(vec![StubEnricher::boxed(Source::Whois, Duration::from_secs(30))])
        .run(support::localhost())
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!report.complete);
    assert!(!report.ports.is_empty());
    assert!(report.ports.len() < 200);
    assert!(report.ports.windows(2).all(|pair| pair[0].port < pair[1].port));
    assert_eq!(
        report.fragment(Source::Whois).unwrap().status,
        FragmentStatus::Unavailable
    );
}
