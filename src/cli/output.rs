//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::StoredRecord;
use crate::error::Error;
use crate::pipeline::RunSummary;
use crate::storage::traits::{SessionRecord, StorageStats, StoredBatch};
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(stats: &StorageStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json => format_json(stats),
    }
}

fn format_status_text(stats: &StorageStats) -> String {
    let mut output = String::new();
    output.push_str("Pusher Status\n");
    output.push_str("=============\n\n");
    let _ = writeln!(output, "  Files:         {}", stats.file_count);
    let _ = writeln!(output, "  Sessions:      {}", stats.session_count);
    let _ = writeln!(output, "  Batches:       {}", stats.batch_count);
    let _ = writeln!(
        output,
        "  Payload size:  {}",
        format_size(stats.total_payload_size)
    );
    let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:       {size} bytes");
    }
    output
}

/// Result of a `push` run.
#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    /// Session the events were captured under.
    pub session_id: String,
    /// Document the session belongs to.
    pub document: String,
    /// Whether the event store was bypassed.
    pub dry_run: bool,
    /// Lines of the event source that failed to parse.
    pub malformed: usize,
    /// Pipeline totals.
    #[serde(flatten)]
    pub summary: RunSummary,
}

/// Formats the result of a push.
#[must_use]
pub fn format_push_report(report: &PushReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let summary = &report.summary;
            let mut output = String::new();
            let _ = writeln!(
                output,
                "Session {} ({}){}",
                report.session_id,
                report.document,
                if report.dry_run { " [dry run]" } else { "" }
            );
            let _ = writeln!(output, "  Events accepted:  {}", summary.accepted);
            if report.malformed > 0 {
                let _ = writeln!(output, "  Malformed lines:  {}", report.malformed);
            }
            if summary.dropped > 0 {
                let _ = writeln!(output, "  Events dropped:   {}", summary.dropped);
            }
            if summary.rejected > 0 {
                let _ = writeln!(output, "  Events rejected:  {}", summary.rejected);
            }
            let _ = writeln!(
                output,
                "  Batches stored:   {} ({} events)",
                summary.flushed_batches, summary.flushed_events
            );
            if summary.failed_flushes > 0 {
                let _ = writeln!(output, "  Failed flushes:   {}", summary.failed_flushes);
            }
            if !summary.drained {
                output.push_str("  Warning: events remain unflushed\n");
            }
            output
        }
        OutputFormat::Json => format_json(report),
    }
}

/// Formats a session list.
#[must_use]
pub fn format_session_list(sessions: &[SessionRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_session_list_text(sessions),
        OutputFormat::Json => format_json(&sessions),
    }
}

fn format_session_list_text(sessions: &[SessionRecord]) -> String {
    if sessions.is_empty() {
        return "No sessions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str("Sessions:\n");
    let _ = writeln!(
        output,
        "{:<38} {:<38} {:<8} Created",
        "Session", "File", "Batches"
    );
    output.push_str(&"-".repeat(96));
    output.push('\n');

    for session in sessions {
        let _ = writeln!(
            output,
            "{:<38} {:<38} {:<8} {}",
            session.session_id, session.file_id, session.batch_count, session.created_at
        );
    }

    output
}

/// Formats a batch list.
#[must_use]
pub fn format_batch_list(batches: &[StoredBatch], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_batch_list_text(batches),
        OutputFormat::Json => format_json(&batches),
    }
}

fn format_batch_list_text(batches: &[StoredBatch]) -> String {
    if batches.is_empty() {
        return "No batches found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str("Batches:\n");
    let _ = writeln!(output, "{:<6} {:<38} {:<12} Created", "Seq", "Batch", "Payload");
    output.push_str(&"-".repeat(70));
    output.push('\n');

    let mut total = 0;
    for batch in batches {
        total += batch.payload_size;
        let _ = writeln!(
            output,
            "{:<6} {:<38} {:<12} {}",
            batch.seq,
            truncate(&batch.batch_id, 38),
            format_size(batch.payload_size),
            batch.created_at
        );
    }
    let _ = writeln!(output, "\n{} batches, {}", batches.len(), format_size(total));

    output
}

/// Formats decoded records, oldest first.
///
/// Text output shows edit event records as `<event id>\t<content>` and any
/// other record verbatim. JSON output parses each record; records that are
/// not JSON are emitted as strings.
#[must_use]
pub fn format_records(records: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            for record in records {
                match serde_json::from_str::<StoredRecord>(record) {
                    Ok(stored) => {
                        let _ = writeln!(output, "{}\t{}", stored.event_id, stored.content);
                    }
                    Err(_) => {
                        output.push_str(record);
                        output.push('\n');
                    }
                }
            }
            output
        }
        OutputFormat::Json => {
            let values: Vec<serde_json::Value> = records
                .iter()
                .map(|r| {
                    serde_json::from_str(r).unwrap_or_else(|_| serde_json::Value::String(r.clone()))
                })
                .collect();
            format_json(&values)
        }
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("Error: {error}"),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorBody {
                error: String,
                recoverable: bool,
            }
            format_json(&ErrorBody {
                error: error.to_string(),
                recoverable: error.is_recoverable(),
            })
        }
    }
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Truncates an ASCII identifier to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len || !s.is_char_boundary(max_len.saturating_sub(3)) {
        s.to_string()
    } else if max_len <= 3 {
        s[..max_len].to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
