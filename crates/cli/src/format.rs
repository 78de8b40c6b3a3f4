//! Output → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): tables and one-line messages
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use std::fmt::Display;

use fleetvault_durability::{RetentionReport, SnapshotInfo};
use fleetvault_engine::{RestoreSummary, TableStats, VerifyReport};
use serde::Serialize;
use serde_json::json;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| json!({ "error": format!("output not serializable: {}", e) }).to_string())
}

/// Format an error.
pub fn format_error(err: &dyn Display, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&json!({ "error": err.to_string() })),
        OutputMode::Human => format!("(error) {}", err),
    }
}

/// Format the result of `snapshot`.
pub fn format_snapshot_info(info: &SnapshotInfo, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&json!({
            "path": info.path.display().to_string(),
            "created_at": info.created_at,
            "records": info.records,
            "bytes": info.bytes,
        })),
        OutputMode::Human => format!(
            "Wrote {} ({} records, {} bytes)",
            info.path.display(),
            info.records,
            info.bytes
        ),
    }
}

/// Format the result of `restore`.
pub fn format_restore_summary(summary: &RestoreSummary, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(summary),
        OutputMode::Human => format!("{}\n{}", summary, summary.render_table()),
    }
}

/// Format the result of `verify`.
pub fn format_verify_report(report: &VerifyReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&json!({
            "ok": report.is_ok(),
            "report": report,
        })),
        OutputMode::Human => {
            let mut out = format!(
                "{} from {} ({}): {} records in {} sections\n",
                if report.is_ok() { "OK" } else { "FAILED" },
                report.source,
                report.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.total_records(),
                report.sections.len()
            );
            for section in &report.sections {
                out.push_str(&format!("  {:<18} {:>8}\n", section.entity, section.records));
                if !section.unknown_fields.is_empty() {
                    out.push_str(&format!(
                        "    ignored fields: {}\n",
                        section.unknown_fields.join(", ")
                    ));
                }
            }
            for name in &report.unknown_sections {
                out.push_str(&format!("  unknown section: {}\n", name));
            }
            for issue in &report.issues {
                match issue.snapshot_id {
                    Some(id) => out.push_str(&format!(
                        "  {} #{}: {}\n",
                        issue.entity, id, issue.problem
                    )),
                    None => out.push_str(&format!("  {}: {}\n", issue.entity, issue.problem)),
                }
            }
            out
        }
    }
}

/// Format the result of `stats`.
pub fn format_table_stats(stats: &TableStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(stats),
        OutputMode::Human => stats.render_table(),
    }
}

/// Format the result of `retention`.
pub fn format_retention_report(report: &RetentionReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&json!({
            "kept": report.kept.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "deleted": report.deleted.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "failures": report.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
        })),
        OutputMode::Human => {
            let mut out = format!(
                "Kept {}, deleted {}",
                report.kept.len(),
                report.deleted.len()
            );
            for path in &report.deleted {
                out.push_str(&format!("\n  deleted {}", path.display()));
            }
            for failure in &report.failures {
                out.push_str(&format!("\n  (warning) {}", failure));
            }
            out
        }
    }
}
