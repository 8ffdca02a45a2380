use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use colored::*;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span, warn};

use crate::commands::CommandLine;
use crate::mprint;
use crate::terminal::{colors, format, print, progress};
use nexa_common::config::Config;
use nexa_common::network::target::Target;
use nexa_common::report::{PortState, ScanReport};
use nexa_core::{AgentOutcome, ReportEmitter, ScanPipeline};
use nexa_plugins::default_enrichers;

/// Conventional exit status after SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

pub async fn scan(cmd: &CommandLine) -> anyhow::Result<ExitCode> {
    let cfg: Config = cmd.to_config()?;

    print::header("target");
    let target: Target = Target::resolve(&cmd.target)
        .await
        .with_context(|| format!("cannot scan {}", cmd.target))?;
    print_setup(&target, &cfg);

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    let span = info_span!("scan", indicatif.pb_show = true);
    progress::port_bar(&span, cfg.ports.len());

    let start_time: Instant = Instant::now();
    let mut report: ScanReport = ScanPipeline::new(cfg.clone(), cancel.clone())
        .with_enrichers(default_enrichers(&cfg, &cancel))
        .on_port_scanned(progress::port_callback(&span))
        .run(target)
        .instrument(span.clone())
        .await;
    drop(span);

    scan_ends(&report, start_time.elapsed(), &cfg);

    let emitter = ReportEmitter::new(&cfg, cancel.clone());
    let outcome = emitter.emit(&mut report).await?;
    print_analysis(&outcome);

    print::aligned_line("Report", emitter.output().display().to_string());
    print::end_of_program();

    if cancel.is_cancelled() {
        warn!("Scan interrupted, the report is partial");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}

fn watch_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, wrapping up with what we have");
            cancel.cancel();
        }
    });
}

fn print_setup(target: &Target, cfg: &Config) {
    print::aligned_line("Target", target.to_string());
    print::aligned_line("Address", target.ip.to_string());
    print::aligned_line("Ports", format!("{} ({} total)", cfg.ports, cfg.ports.len()));
    print::aligned_line("Concurrency", cfg.concurrency.to_string());
    print::aligned_line(
        "Timeout",
        format!("{:.2}s", cfg.connect_timeout.as_secs_f64()),
    );
    let deep_scan = if cfg.deep_scan {
        "nmap".color(colors::STATUS_OK)
    } else {
        "disabled".color(colors::STATUS_UNAVAILABLE)
    };
    print::aligned_line("Deep scan", deep_scan);
}

fn scan_ends(report: &ScanReport, total_time: Duration, cfg: &Config) {
    mprint!();
    print::header("port status");
    let rows = report.summary_rows();
    if rows.is_empty() {
        print::no_results();
    } else {
        for line in format::port_table(&rows) {
            print::print(&line);
        }
    }

    mprint!();
    print::header("enrichment");
    for fragment in &report.enrichment {
        print::aligned_line(
            &fragment.source.to_string(),
            format::fragment_status(fragment, cfg.debug),
        );
    }

    print_summary(report, total_time);
}

fn print_summary(report: &ScanReport, total_time: Duration) {
    let open: ColoredString = format!("{} open", report.count(PortState::Open)).bold().green();
    let filtered: ColoredString =
        format!("{} filtered", report.count(PortState::Filtered)).bold().yellow();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let verb = if report.complete { "Scan Complete" } else { "Scan Interrupted" };
    let output: ColoredString = format!(
        "{verb}: {open}, {filtered} of {} ports in {total_time}",
        report.ports.len()
    )
    .color(colors::SECONDARY);

    print::fat_separator();
    print::centerln(&output.to_string());
}

fn print_analysis(outcome: &AgentOutcome) {
    match outcome {
        AgentOutcome::Narrative(text) => {
            mprint!();
            print::header("analysis");
            for line in format::highlight_narrative(text) {
                print::print(&line);
            }
        }
        AgentOutcome::Skipped => {}
        AgentOutcome::Unavailable(reason) => {
            warn!("Analysis agent unavailable ({reason}), structured report only");
        }
        AgentOutcome::Failed(reason) => {
            warn!("Analysis agent failed ({reason}), structured report only");
        }
    }
}
