use std::sync::Arc;

use indicatif::ProgressStyle;
use nexa_core::scanner::ProgressCallback;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

const PORT_BAR_TEMPLATE: &str =
    "{spinner:.blue} [{elapsed_precise}] {bar:36.cyan/blue} {pos:>5}/{len:5} {msg}";

/// Turns `span` into a progress bar over `ports` classifications.
pub fn port_bar(span: &Span, ports: usize) {
    if let Ok(style) = ProgressStyle::with_template(PORT_BAR_TEMPLATE) {
        span.pb_set_style(&style.progress_chars("■■□").tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ]));
    }
    span.pb_set_length(ports as u64);
    span.pb_set_message("probing ports");
}

/// Advances the bar once per classified port, from any worker task.
pub fn port_callback(span: &Span) -> ProgressCallback {
    let span = span.clone();
    Arc::new(move |_scanned| span.pb_inc(1))
}
