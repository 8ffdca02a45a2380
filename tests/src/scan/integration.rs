use std::sync::Arc;
use std::time::Duration;

use nexa_common::network::ports::PortSet;
use nexa_common::report::{PortState, Source};
use nexa_core::ScanPipeline;
use tokio_util::sync::CancellationToken;

use crate::support::{self, FakeProber, StubEnricher};

/// One listener, one refused port: OPEN with banner, CLOSED, nothing else.
#[tokio::test]
async fn loopback_ports_are_classified() {
    let open = support::greeting_listener(b"SSH-2.0-OpenSSH_9.6 test\r\n").await;
    let closed = support::refused_port().await;

    let mut cfg = support::config("1");
    cfg.ports = PortSet::from_ports([open, closed]).unwrap();

    let report = ScanPipeline::new(cfg, CancellationToken::new())
        .run(support::localhost())
        .await;

    assert!(report.complete);
    assert_eq!(report.ports.len(), 2);

    let open_result = report.ports.iter().find(|p| p.port == open).unwrap();
    assert_eq!(open_result.state, PortState::Open);
    assert_eq!(open_result.banner.as_deref(), Some("SSH-2.0-OpenSSH_9.6 test"));
    assert_eq!(open_result.protocol_hint.as_deref(), Some("ssh"));

    let closed_result = report.ports.iter().find(|p| p.port == closed).unwrap();
    assert_eq!(closed_result.state, PortState::Closed);
    assert_eq!(closed_result.banner, None);
}

#[tokio::test]
async fn every_port_reported_once_in_order() {
    let prober = FakeProber {
        open: vec![5],
        closed: vec![3],
        delay: Duration::from_millis(1),
    };
    let report = ScanPipeline::new(support::config("1-10"), CancellationToken::new())
        .with_prober(Arc::new(prober))
        .run(support::localhost())
        .await;

    let ports: Vec<u16> = report.ports.iter().map(|p| p.port).collect();
    assert_eq!(ports, (1..=10).collect::<Vec<u16>>());
    assert_eq!(report.ports[4].state, PortState::Open);
    assert_eq!(report.ports[2].state, PortState::Closed);
    assert_eq!(report.count(PortState::Filtered), 8);
}

#[tokio::test]
async fn repeated_runs_agree() {
    async fn run_once() -> nexa_common::report::ScanReport {
        let prober = FakeProber {
            open: vec![22, 80],
            closed: vec![23],
            delay: Duration::from_millis(2),
        };
        ScanPipeline::new(support::config("20-90"), CancellationToken::new())
            .with_prober(Arc::new(prober))
            .with_enrichers(vec![
                StubEnricher::boxed(Source::Whois, Duration::from_millis(30)),
                StubEnricher::boxed(Source::Dns, Duration::ZERO),
            ])
            .run(support::localhost())
            .await
    }

    let first = run_once().await;
    let second = run_once().await;

    assert_eq!(first.ports, second.ports);
    assert_eq!(first.enrichment, second.enrichment);
    assert_eq!(first.summary_rows(), second.summary_rows());
}

#[tokio::test]
#[ignore]
async fn unroutable_address_is_filtered() {
    let mut cfg = support::config("80,443");
    cfg.connect_timeout = Duration::from_millis(500);
    let target = nexa_common::network::target::Target::from_ip("192.0.2.1".parse().unwrap());

    let report = ScanPipeline::new(cfg, CancellationToken::new()).run(target).await;
    assert!(report.ports.iter().all(|p| p.state == PortState::Filtered));
}
