//! Plain-text rendering of captured entries.
//!
//! Per-entry formatters produce one line (multi-line for errors);
//! [`ReportBuilder`] aggregates the most recent entries of every log into
//! one copyable block.

use crate::console::ConsoleEntry;
use crate::errors::ErrorEntry;
use crate::health::HealthIssue;
use crate::network::NetworkEntry;
use crate::perf::{Metric, PerfEntry};
use crate::snapshot::StorageSnapshot;
use crate::value::format_number;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

fn utc(epoch_millis: f64) -> Option<DateTime<Utc>> {
    if !epoch_millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(epoch_millis.round() as i64)
}

/// `HH:MM:SS.mmm` in UTC.
#[must_use]
pub fn format_time(epoch_millis: f64) -> String {
    utc(epoch_millis).map_or_else(
        || "--:--:--.---".to_string(),
        |t| t.format("%H:%M:%S%.3f").to_string(),
    )
}

/// ISO-8601 with millisecond precision in UTC.
#[must_use]
pub fn format_iso(epoch_millis: f64) -> String {
    utc(epoch_millis).map_or_else(
        || format_number(epoch_millis),
        |t| t.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// `[HH:MM:SS.mmm] LEVEL message`
#[must_use]
pub fn format_console_entry(entry: &ConsoleEntry) -> String {
    format!(
        "[{}] {} {}",
        format_time(entry.timestamp),
        entry.level.as_str().to_ascii_uppercase(),
        entry.message()
    )
}

/// `METHOD STATUS url (Nms, req B / res B)`; status 0 renders as `ERR`.
#[must_use]
pub fn format_network_entry(entry: &NetworkEntry) -> String {
    let status = if entry.status == 0 {
        "ERR".to_string()
    } else {
        entry.status.to_string()
    };
    format!(
        "{} {} {} ({}ms, {} B / {} B)",
        entry.method,
        status,
        entry.url,
        format_number(entry.duration.round()),
        entry.request_size,
        entry.response_size
    )
}

/// Header line with kind and message, then location and stack.
#[must_use]
pub fn format_error_entry(entry: &ErrorEntry) -> String {
    let mut out = format!("[{}] {}: {}", format_time(entry.timestamp), entry.kind, entry.message);
    if let Some(location) = entry.location() {
        let _ = write!(out, "\n  at {location}");
    }
    if let Some(stack) = entry.stack.as_deref().filter(|s| !s.trim().is_empty()) {
        for line in stack.lines() {
            let _ = write!(out, "\n    {}", line.trim());
        }
    }
    out
}

/// `METRIC value (rating)`
#[must_use]
pub fn format_perf_entry(entry: &PerfEntry) -> String {
    let value = match entry.metric {
        Metric::Cls => format!("{:.3}", entry.value),
        metric => format!("{}{}", format_number(entry.value), metric.unit()),
    };
    format!("{} {} ({})", entry.metric, value, entry.rating)
}

/// `[severity] category: message (detail)`
#[must_use]
pub fn format_health_issue(issue: &HealthIssue) -> String {
    let mut out = format!(
        "[{}] {}: {}",
        issue.severity.as_str(),
        issue.category.as_str(),
        issue.message
    );
    if let Some(detail) = &issue.detail {
        let _ = write!(out, " ({detail})");
    }
    out
}

/// Entries shown per report section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportLimits {
    /// Console lines
    pub console: usize,
    /// Network lines
    pub network: usize,
    /// Error blocks
    pub errors: usize,
    /// Perf lines
    pub perf: usize,
    /// Health lines
    pub health: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            console: 10,
            network: 10,
            errors: 5,
            perf: 10,
            health: 10,
        }
    }
}

/// Everything a report is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportInput<'a> {
    /// Page URL
    pub page_url: &'a str,
    /// Epoch milliseconds
    pub generated_at: f64,
    /// Console entries, oldest first
    pub console: &'a [ConsoleEntry],
    /// Network entries, oldest first
    pub network: &'a [NetworkEntry],
    /// Error entries, oldest first
    pub errors: &'a [ErrorEntry],
    /// Perf entries, oldest first
    pub perf: &'a [PerfEntry],
    /// Health issues, oldest first
    pub health: &'a [HealthIssue],
    /// Last storage snapshot, if one was taken
    pub storage: Option<&'a StorageSnapshot>,
}

/// Builds the full text report.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBuilder {
    limits: ReportLimits,
}

impl ReportBuilder {
    /// Create a builder with the given section limits.
    #[must_use]
    pub const fn new(limits: ReportLimits) -> Self {
        Self { limits }
    }

    /// Section limits.
    #[must_use]
    pub const fn limits(&self) -> ReportLimits {
        self.limits
    }

    /// Render the report.
    #[must_use]
    pub fn build(&self, input: &ReportInput<'_>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Page Report ===");
        let _ = writeln!(out, "URL: {}", input.page_url);
        let _ = writeln!(out, "Generated: {}", format_iso(input.generated_at));

        section(&mut out, "Console", input.console, self.limits.console, format_console_entry);
        section(&mut out, "Network", input.network, self.limits.network, format_network_entry);
        section(&mut out, "Errors", input.errors, self.limits.errors, format_error_entry);
        section(&mut out, "Performance", input.perf, self.limits.perf, format_perf_entry);
        section(&mut out, "Health", input.health, self.limits.health, format_health_issue);

        if let Some(storage) = input.storage {
            let _ = writeln!(out, "\n--- Storage ---");
            let _ = writeln!(
                out,
                "localStorage: {} keys, sessionStorage: {} keys, cookies: {}",
                storage.local.len(),
                storage.session.len(),
                storage.parsed_cookies().len()
            );
        }
        out.trim_end().to_string()
    }
}

fn section<T>(out: &mut String, title: &str, entries: &[T], limit: usize, format: fn(&T) -> String) {
    let shown = &entries[entries.len().saturating_sub(limit)..];
    let _ = writeln!(out, "\n--- {title} ({} of {}) ---", shown.len(), entries.len());
    if shown.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for entry in shown {
        let _ = writeln!(out, "{}", format(entry));
    }
}
