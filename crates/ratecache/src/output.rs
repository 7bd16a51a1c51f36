//! Output formatting functions.

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::diagnostics::KeyEntry;
use crate::instrumentation::MetricsSnapshot;
use crate::pricing::RateRequest;

/// Result of one lookup in a `rate` run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RateOutcome {
    Ok { rate: f64 },
    Error { message: String },
}

/// Everything a `rate` run prints.
#[derive(Debug, Clone, Serialize)]
pub struct RateReport {
    pub request: RateRequest,
    pub results: Vec<RateOutcome>,
    pub metrics: MetricsSnapshot,
}

/// Format a value for output.
pub fn format_output<T: Serialize>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(value).unwrap_or_default(),
        OutputFormat::Pretty => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

/// Format a rate run for display.
pub fn format_report(report: &RateReport) -> String {
    let request = &report.request;
    let mut output = format!(
        "{} / {} / {}\n",
        request.hotel, request.room, request.period
    );
    output.push_str(&"-".repeat(40));
    for (i, result) in report.results.iter().enumerate() {
        match result {
            RateOutcome::Ok { rate } => output.push_str(&format!("\n  #{}: {:.2}", i + 1, rate)),
            RateOutcome::Error { message } => {
                output.push_str(&format!("\n  #{}: {}", i + 1, message))
            }
        }
    }
    let m = &report.metrics;
    output.push_str(&format!(
        "\n\nhits: {}  misses: {}  retries: {}  failures: {}  fallbacks: {}  takeovers: {}",
        m.hits, m.misses, m.retries, m.failures, m.fallbacks, m.takeovers
    ));
    output
}

/// Format cache keys for display.
pub fn format_keys(entries: &[KeyEntry]) -> String {
    if entries.is_empty() {
        return "No keys found.".to_string();
    }
    let mut output = format!("KEYS ({})\n", entries.len());
    output.push_str(&"-".repeat(40));
    for entry in entries {
        let ttl = entry
            .ttl
            .map(|ttl| format!("{}ms", ttl.as_millis()))
            .unwrap_or_else(|| "no expiry".to_string());
        output.push_str(&format!("\n{}\n  Value: {}\n  TTL: {}", entry.key, entry.value, ttl));
    }
    output
}
