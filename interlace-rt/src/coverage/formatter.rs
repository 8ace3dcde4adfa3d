//! Pluggable coverage report formatting.

// Layer 1: Standard library imports
use std::fmt::Write as _;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::CoverageInfo;

/// Renders a coverage report for human or tool consumption.
pub trait CoverageFormatter {
    fn format(&self, info: &CoverageInfo) -> String;
}

/// JSON formatter for downstream tooling.
#[derive(Debug, Default)]
pub struct JsonCoverageFormatter;

impl CoverageFormatter for JsonCoverageFormatter {
    fn format(&self, info: &CoverageInfo) -> String {
        serde_json::to_string_pretty(info).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Plain-text formatter used by the test reports.
#[derive(Debug, Default)]
pub struct TextCoverageFormatter;

impl CoverageFormatter for TextCoverageFormatter {
    fn format(&self, info: &CoverageInfo) -> String {
        let mut out = String::new();
        for (machine, coverage) in &info.machines {
            let kind = if coverage.is_monitor { "monitor" } else { "machine" };
            let _ = writeln!(out, "{kind} {machine}:");
            for state in &coverage.states {
                let _ = writeln!(out, "  state {state}");
            }
            for (from, event, to) in &coverage.transitions {
                let _ = writeln!(out, "  {from} --{event}--> {to}");
            }
            if !coverage.events_received.is_empty() {
                let received: Vec<&str> =
                    coverage.events_received.iter().map(String::as_str).collect();
                let _ = writeln!(out, "  received: {}", received.join(", "));
            }
            if !coverage.events_sent.is_empty() {
                let sent: Vec<&str> = coverage.events_sent.iter().map(String::as_str).collect();
                let _ = writeln!(out, "  sent: {}", sent.join(", "));
            }
        }
        out
    }
}
