use std::sync::Arc;
use std::time::Duration;

use nexa_common::report::Source;
use nexa_core::{AgentOutcome, ReportEmitter, ScanPipeline};
use tokio_util::sync::CancellationToken;

use crate::support::{self, FakeProber, StubEnricher};

async fn scanned_report() -> nexa_common::report::ScanReport {
    let prober = FakeProber {
        open: vec![22, 443],
        closed: vec![],
        delay: Duration::ZERO,
    };
    ScanPipeline::new(support::config("20-25,443"), CancellationToken::new())
        .with_prober(Arc::new(prober))
        .with_enrichers(vec![StubEnricher::boxed(Source::Whois, Duration::ZERO)])
        .run(support::localhost())
        .await
}

#[tokio::test]
async fn missing_agent_degrades_to_artifact_only() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = support::config("20-25,443");
    cfg.agent = true;
    cfg.agent_path = Some(dir.path().join("missing-agent"));
    cfg.output = dir.path().join("report.json");

    let mut report = scanned_report().await;
    let outcome = ReportEmitter::new(&cfg, CancellationToken::new())
        .emit(&mut report)
        .await?;

    assert!(matches!(outcome, AgentOutcome::Unavailable(_)));
    let artifact: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&cfg.output)?)?;
    assert_eq!(artifact["ports"].as_array().map(Vec::len), Some(7));
    assert_eq!(artifact["complete"], true);
    assert_eq!(artifact["enrichment"][0]["source"], "WHOIS");
    assert!(artifact.get("narrative").is_none());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn echoing_agent_receives_the_report() -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir()?;
    let agent = dir.path().join("agent");
    std::fs::write(&agent, "#!/bin/sh\ncat\n")?;
    std::fs::set_permissions(&agent, std::fs::Permissions::from_mode(0o755))?;

    let mut cfg = support::config("20-25,443");
    cfg.agent = true;
    cfg.agent_path = Some(agent);
    cfg.output = dir.path().join("report.json");

    let mut report = scanned_report().await;
    let outcome = ReportEmitter::new(&cfg, CancellationToken::new())
        .emit(&mut report)
        .await?;

    let AgentOutcome::Narrative(text) = outcome else {
        panic!("expected a narrative, got {outcome:?}");
    };
    assert!(text.contains("22 OPEN ssh"));
    assert!(text.contains("443 OPEN https"));
    assert_eq!(report.narrative.as_deref(), Some(text.as_str()));

    let artifact: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&cfg.output)?)?;
    assert_eq!(artifact["narrative"], text.as_str());
    Ok(())
}
