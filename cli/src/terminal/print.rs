//! Line builders for the scan report and the single sink they are printed through.

use std::fmt::Display;

use colored::*;
use console::measure_text_width;
use tracing::info;

use crate::terminal::{banner, colors};

pub const TOTAL_WIDTH: usize = 72;
pub const KEY_WIDTH: usize = 12;

#[macro_export]
macro_rules! mprint {
    () => {
        $crate::terminal::print::print("");
    };
    ($msg:expr) => {
        $crate::terminal::print::print($msg);
    };
}

/// Every user-facing line is a tracing event so it interleaves cleanly with
/// the progress bar.
pub fn print(msg: &str) {
    info!(target: "nexa::print", raw_msg = msg);
}

/// `fill` on both sides of `middle`, together `TOTAL_WIDTH` columns wide.
fn framed(middle: &str, fill: &str) -> String {
    let free = TOTAL_WIDTH.saturating_sub(measure_text_width(middle));
    let left = free / 2;
    format!(
        "{}{}{}",
        fill.repeat(left).color(colors::SEPARATOR),
        middle,
        fill.repeat(free - left).color(colors::SEPARATOR)
    )
}

fn section_line(title: &str) -> String {
    let title = format!("⟦ {} ⟧", title.to_uppercase()).color(colors::PRIMARY);
    framed(&title.to_string(), "─")
}

/// `Key.....: value`, dots padding every key to `KEY_WIDTH`.
fn key_value_line(key: &str, value: impl Display) -> String {
    let dots = ".".repeat((KEY_WIDTH + 1).saturating_sub(key.chars().count()));
    format!(
        "{} {}{}{} {}",
        ">".color(colors::SEPARATOR),
        key.color(colors::PRIMARY),
        dots.color(colors::SEPARATOR),
        ":".color(colors::SEPARATOR),
        value
    )
}

pub fn banner() {
    let title = format!("⟦ NEXA v{} ⟧", env!("CARGO_PKG_VERSION"))
        .color(colors::PRIMARY)
        .bold();
    print(&framed(&title.to_string(), "═"));
    banner::print();
}

pub fn header(title: &str) {
    print(&section_line(title));
}

pub fn fat_separator() {
    print(&"═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR).to_string());
}

pub fn aligned_line(key: &str, value: impl Display) {
    print(&key_value_line(key, value));
}

pub fn centerln(msg: &str) {
    print(&framed(msg, " "));
}

pub fn no_results() {
    print(
        &"[!] No open or relevant filtered ports found."
            .color(colors::STATE_CLOSED)
            .bold()
            .to_string(),
    );
}

pub fn end_of_program() {
    fat_separator();
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
