use colored::*;
use nexa_common::report::{EnrichmentFragment, FragmentStatus, PortRow, PortState};
use unicode_width::UnicodeWidthStr;

use crate::terminal::colors;

const PORT_WIDTH: usize = 7;
const STATE_WIDTH: usize = 10;
const MIN_SERVICE_WIDTH: usize = 8;
const MAX_SERVICE_WIDTH: usize = 28;

/// Words that mark a narrative line as a finding worth highlighting.
const FINDING_MARKERS: &[&str] = &[
    "vulnerabilit",
    "impact",
    "recommendation",
    "cve",
    "advisories",
    "remediation",
    "detection",
];

fn pad(text: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(used)))
}

fn truncate(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if UnicodeWidthStr::width(out.as_str()) + 1 >= width {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

fn state_color(state: PortState) -> Color {
    match state {
        PortState::Open => colors::STATE_OPEN,
        PortState::Filtered => colors::STATE_FILTERED,
        PortState::Closed => colors::STATE_CLOSED,
    }
}

/// Renders the port table, header line included.
pub fn port_table(rows: &[PortRow]) -> Vec<String> {
    let service_width = rows
        .iter()
        .map(|row| UnicodeWidthStr::width(row.service.as_str()))
        .max()
        .unwrap_or(0)
        .clamp(MIN_SERVICE_WIDTH, MAX_SERVICE_WIDTH);

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!(
        "{}{}{}{}",
        pad("PORT", PORT_WIDTH),
        pad("STATE", STATE_WIDTH),
        pad("SERVICE", service_width + 2),
        "VERSION/BANNER"
    )
    .bold()
    .to_string());
    lines.push(
        "─".repeat(PORT_WIDTH + STATE_WIDTH + service_width + 2 + 24)
            .color(colors::SEPARATOR)
            .to_string(),
    );

    for row in rows {
        let service = truncate(&row.service, service_width);
        lines.push(format!(
            "{}{}{}{}",
            pad(&row.port.to_string(), PORT_WIDTH).color(colors::PORT),
            pad(&row.state.to_string(), STATE_WIDTH).color(state_color(row.state)),
            pad(&service, service_width + 2).color(colors::TEXT_DEFAULT),
            row.version
        ));
    }
    lines
}

/// `SOURCE .... STATUS`, with the reason when `verbose`.
pub fn fragment_status(fragment: &EnrichmentFragment, verbose: bool) -> String {
    let color = match fragment.status {
        FragmentStatus::Ok => colors::STATUS_OK,
        FragmentStatus::Unavailable => colors::STATUS_UNAVAILABLE,
        FragmentStatus::Error => colors::STATUS_ERROR,
    };
    let status = fragment.status.to_string().color(color).bold();
    match (&fragment.detail, verbose) {
        (Some(detail), true) => format!("{status} {}", format!("({detail})").dimmed()),
        _ => status.to_string(),
    }
}

/// Colors the agent's narrative line by line.
pub fn highlight_narrative(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let lower = line.to_lowercase();
            if trimmed.starts_with('#') || trimmed.starts_with("**") {
                line.color(colors::NARRATIVE_HEADING).bold().to_string()
            } else if FINDING_MARKERS.iter().any(|marker| lower.contains(marker)) {
                line.color(colors::NARRATIVE_FINDING).to_string()
            } else {
                line.color(colors::TEXT_DEFAULT).to_string()
            }
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
