//! # Report Emitter
//!
//! Persists the merged report as JSON and hands it to the external analysis
//! agent. The artifact is always written first, so a missing or failing
//! agent still leaves a usable result behind.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use nexa_common::config::{Config, DEFAULT_AGENT};
use nexa_common::error::ProcessError;
use nexa_common::report::{FragmentStatus, Payload, ScanReport, Source};
use nexa_common::utils::process;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const AGENT_ARGS: [&str; 2] = ["-p", ""];

/// How the analysis step ended. Only `Narrative` changes the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Narrative(String),
    /// `--no-agent`.
    Skipped,
    /// No executable to run.
    Unavailable(String),
    /// The agent ran but produced nothing usable.
    Failed(String),
}

pub struct ReportEmitter {
    output: PathBuf,
    agent_enabled: bool,
    agent_path: Option<PathBuf>,
    agent_timeout: Duration,
    cancel: CancellationToken,
}

impl ReportEmitter {
    pub fn new(config: &Config, cancel: CancellationToken) -> Self {
        Self {
            output: config.output.clone(),
            agent_enabled: config.agent,
            agent_path: config.agent_path.clone(),
            agent_timeout: config.agent_timeout,
            cancel,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Writes the artifact, runs the agent and, on a narrative, rewrites the
    /// artifact with it. Only artifact I/O is an error.
    pub async fn emit(&self, report: &mut ScanReport) -> anyhow::Result<AgentOutcome> {
        write_artifact(report, &self.output).await?;
        info!("Report written to {}", self.output.display());

        let outcome = self.analyze(report).await;
        if let AgentOutcome::Narrative(text) = &outcome {
            report.narrative = Some(text.clone());
            write_artifact(report, &self.output).await?;
            debug!("artifact updated with narrative");
        }
        Ok(outcome)
    }

    async fn analyze(&self, report: &ScanReport) -> AgentOutcome {
        if !self.agent_enabled {
            return AgentOutcome::Skipped;
        }
        if self.cancel.is_cancelled() {
            return AgentOutcome::Skipped;
        }

        let Some(agent) = self.locate_agent() else {
            let wanted = self
                .agent_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| DEFAULT_AGENT.to_string());
            warn!("Analysis agent {wanted} not found, keeping the structured report only");
            return AgentOutcome::Unavailable(format!("{wanted} not found"));
        };

        let prompt = build_prompt(report);
        info!("Handing report to {}", agent.display());

        match process::run(
            &agent,
            AGENT_ARGS,
            Some(prompt.as_bytes()),
            self.agent_timeout,
            &self.cancel,
        )
        .await
        {
            Ok(output) => {
                let text = output.stdout.trim().to_string();
                if text.is_empty() {
                    AgentOutcome::Failed("agent produced no output".into())
                } else {
                    AgentOutcome::Narrative(text)
                }
            }
            Err(ProcessError::NotFound(program)) => {
                AgentOutcome::Unavailable(format!("{program} not found"))
            }
            Err(e) => {
                debug!("analysis agent failed: {e}");
                AgentOutcome::Failed(e.to_string())
            }
        }
    }

    fn locate_agent(&self) -> Option<PathBuf> {
        match &self.agent_path {
            Some(path) => process::which(path),
            None => process::which(DEFAULT_AGENT),
        }
    }
}

pub async fn write_artifact(report: &ScanReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    tokio::fs::write(path, json + "\n")
        .await
        .with_context(|| format!("writing report to {}", path.display()))
}

/// Analyst instructions followed by the merged findings.
pub fn build_prompt(report: &ScanReport) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "TASK: You are a security analyst writing a concise, defensive assessment of {}.",
        report.target
    );
    let _ = writeln!(
        prompt,
        "Base it only on the port scan, fingerprint, WHOIS, DNS and HTTP data below."
    );
    if !report.complete {
        let _ = writeln!(prompt, "NOTE: the scan was interrupted, the data is partial.");
    }

    let _ = writeln!(prompt, "\nPORTS (port state service version):");
    let rows = report.summary_rows();
    if rows.is_empty() {
        let _ = writeln!(prompt, "(no open or relevant filtered ports)");
    }
    for row in rows {
        let _ = writeln!(prompt, "{} {} {} {}", row.port, row.state, row.service, row.version);
    }

    if let Some(os) = report
        .fragment(Source::DeepScan)
        .and_then(|f| f.payload.field("os"))
    {
        let _ = writeln!(prompt, "\nOS FINGERPRINT: {os}");
    }

    for source in [Source::Whois, Source::Dns, Source::Http] {
        let _ = writeln!(prompt, "\n{source}:");
        let _ = writeln!(prompt, "{}", section(report, source));
    }

    let _ = writeln!(
        prompt,
        "\nINSTRUCTIONS:\n\
         - For each exposed service, list likely CVE IDs and vendor advisories (cite only), \
         explain the high-level impact, and give remediation and detection recommendations.\n\
         - Summarize WHOIS/DNS information (hosting, ASN, registrar) and relevant public signals.\n\
         - Do not provide exploit code, payloads or step-by-step compromise instructions.\n\
         - Keep the output concise and suitable for a disclosure or SOC ticket."
    );

    prompt
}

fn section(report: &ScanReport, source: Source) -> String {
    let Some(fragment) = report.fragment(source) else {
        return "(not collected)".into();
    };
    if fragment.status != FragmentStatus::Ok {
        return format!(
            "({}: {})",
            fragment.status,
            fragment.detail.as_deref().unwrap_or("no detail")
        );
    }

    match &fragment.payload {
        Payload::Empty => "(no data)".into(),
        Payload::Text(text) => text.clone(),
        Payload::Fields(fields) => fields
            .iter()
            .filter(|(key, _)| key.as_str() != "raw")
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<String>>()
            .join("\n"),
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
    use nexa_common::network::target::Target;
    use nexa_common::report::{EnrichmentFragment, PortResult, PortState, ReportMerger};
    use std::collections::BTreeMap;
    use std::net::{IpAddr, Ipv4Addr};

    fn report() -> ScanReport {
        let mut merger = ReportMerger::new(Target::from_ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9))));
        merger.add_port(PortResult::new(22, PortState::Open));
        merger.set_banner(22, "SSH-2.0-OpenSSH_9.6".into(), Some("ssh".into()));
        merger.add_port(PortResult::new(23, PortState::Closed));

        let fields = BTreeMap::from([
            ("registrar".to_string(), "Example Registrar".to_string()),
            ("raw".to_string(), "very long raw text".to_string()),
        ]);
        merger.add_fragment(0, EnrichmentFragment::ok(Source::Whois, Payload::Fields(fields)));
        merger.add_fragment(1, EnrichmentFragment::unavailable(Source::Http, "no open HTTP port"));
        merger.finish(true)
    }

    fn config(dir: &Path) -> Config {
        let mut cfg = Config::new("22-23".parse().unwrap());
        cfg.output = dir.join("report.json");
        cfg
    }

    #[test]
    fn prompt_lists_ports_and_sections() {
        let prompt = build_prompt(&report());

        assert!(prompt.contains("22 OPEN ssh SSH-2.0-OpenSSH_9.6"));
        assert!(!prompt.contains("23 CLOSED"));
        assert!(prompt.contains("registrar: Example Registrar"));
        assert!(!prompt.contains("very long raw text"));
        assert!(prompt.contains("(UNAVAILABLE: no open HTTP port)"));
        assert!(prompt.contains("DNS:\n(not collected)"));
    }

    #[tokio::test]
    async fn missing_agent_keeps_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.agent_path = Some(dir.path().join("no-such-agent"));

        let mut report = report();
        let outcome = ReportEmitter::new(&cfg, CancellationToken::new())
            .emit(&mut report)
            .await
            .unwrap();

        assert!(matches!(outcome, AgentOutcome::Unavailable(_)));
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&cfg.output).unwrap()).unwrap();
        assert_eq!(written["ports"][0]["port"], 22);
        assert!(written.get("narrative").is_none());
    }

    #[tokio::test]
    async fn unwritable_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.agent = false;
        cfg.output = dir.path().join("missing").join("report.json");

        let err = ReportEmitter::new(&cfg, CancellationToken::new())
            .emit(&mut report())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("writing report to"), "{err}");
    }

    #[tokio::test]
    async fn disabled_agent_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.agent = false;

        let outcome = ReportEmitter::new(&cfg, CancellationToken::new())
            .emit(&mut report())
            .await
            .unwrap();
        assert_eq!(outcome, AgentOutcome::Skipped);
        assert!(cfg.output.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn narrative_is_stored_in_artifact() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let agent = dir.path().join("agent");
        std::fs::write(&agent, "#!/bin/sh\necho '# Summary'\necho \"args: $#\"\n").unwrap();
        std::fs::set_permissions(&agent, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut cfg = config(dir.path());
        cfg.agent_path = Some(agent);

        let mut report = report();
        let outcome = ReportEmitter::new(&cfg, CancellationToken::new())
            .emit(&mut report)
            .await
            .unwrap();

        assert_eq!(outcome, AgentOutcome::Narrative("# Summary\nargs: 2".into()));
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&cfg.output).unwrap()).unwrap();
        assert_eq!(written["narrative"], "# Summary\nargs: 2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_agent_degrades() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let agent = dir.path().join("agent");
        std::fs::write(&agent, "#!/bin/sh\necho 'quota exceeded' >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&agent, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut cfg = config(dir.path());
        cfg.agent_path = Some(agent);

        let outcome = ReportEmitter::new(&cfg, CancellationToken::new())
            .emit(&mut report())
            .await
            .unwrap();
        assert!(matches!(outcome, AgentOutcome::Failed(_)));
    }
}
