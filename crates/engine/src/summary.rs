//! Restore summary
//!
//! Everything a restore run reports back: per-entity-type counts and phase
//! outcome, every failed row with its natural key and reason, and where the
//! run stopped if it did not finish.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::policy::ConflictPolicy;

/// Row tallies for one entity type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    /// Rows written as new
    pub inserted: u64,
    /// Existing rows overwritten
    pub updated: u64,
    /// Existing rows left alone
    pub skipped: u64,
    /// Rows that could not be restored
    pub failed: u64,
}

impl EntityCounts {
    /// Rows processed in any way
    pub fn processed(&self) -> u64 {
        self.inserted + self.updated + self.skipped + self.failed
    }

    fn add(&mut self, other: &EntityCounts) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// How an entity-type phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Writes are durable
    Committed,
    /// Writes were discarded after an abort
    RolledBack,
    /// Nothing was written by request
    DryRun,
    /// The store failed; writes were discarded and the run stopped
    Failed,
}

impl PhaseStatus {
    /// Lower-case label
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::Committed => "committed",
            PhaseStatus::RolledBack => "rolled back",
            PhaseStatus::DryRun => "dry run",
            PhaseStatus::Failed => "failed",
        }
    }

    /// True if the phase's inserts and updates stand (or would, on a dry run)
    pub fn keeps_writes(self) -> bool {
        matches!(self, PhaseStatus::Committed | PhaseStatus::DryRun)
    }
}

/// Outcome of one entity-type phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    /// Entity type name
    pub entity: &'static str,
    /// Row tallies
    #[serde(flatten)]
    pub counts: EntityCounts,
    /// Phase outcome
    pub status: PhaseStatus,
    /// Snapshot fields the descriptor does not declare (ignored)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
}

/// One snapshot record that could not be restored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Entity type name
    pub entity: &'static str,
    /// Snapshot-local id, when the record had a readable one
    pub snapshot_id: Option<i64>,
    /// Natural key as found in the record (`?` for unreadable parts)
    pub natural_key: String,
    /// Why the row failed
    pub reason: String,
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.entity, self.natural_key)?;
        if let Some(id) = self.snapshot_id {
            write!(f, " #{}", id)?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Report of a whole restore run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoreSummary {
    /// Source recorded in the snapshot
    pub source: String,
    /// Creation time recorded in the snapshot
    pub snapshot_created_at: DateTime<Utc>,
    /// Policy the run used
    pub policy: ConflictPolicy,
    /// True if nothing was written
    pub dry_run: bool,
    /// One report per processed entity type, in restore order
    pub entities: Vec<EntityReport>,
    /// Every failed row, in processing order
    pub failures: Vec<RowFailure>,
    /// Entity type whose phase stopped the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<&'static str>,
    /// Entity types with snapshot data that were never processed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_processed: Vec<&'static str>,
    /// Store error that ended the run, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_error: Option<String>,
    /// Snapshot sections naming no known entity type
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_sections: Vec<String>,
}

impl RestoreSummary {
    /// Empty summary for a run over a snapshot
    pub fn new(
        source: impl Into<String>,
        snapshot_created_at: DateTime<Utc>,
        policy: ConflictPolicy,
        dry_run: bool,
    ) -> Self {
        RestoreSummary {
            source: source.into(),
            snapshot_created_at,
            policy,
            dry_run,
            entities: Vec::new(),
            failures: Vec::new(),
            aborted_at: None,
            not_processed: Vec::new(),
            phase_error: None,
            skipped_sections: Vec::new(),
        }
    }

    /// Tallies for one entity type, if it was processed
    pub fn counts(&self, entity: &str) -> Option<EntityCounts> {
        self.entities
            .iter()
            .find(|r| r.entity == entity)
            .map(|r| r.counts)
    }

    /// Rows written, skipped and failed over the whole run
    ///
    /// Inserts, updates and skips of a rolled-back or failed phase were
    /// discarded and are left out; its failed rows still count.
    pub fn totals(&self) -> EntityCounts {
        let mut totals = EntityCounts::default();
        for report in &self.entities {
            if report.status.keeps_writes() {
                totals.add(&report.counts);
            } else {
                totals.failed += report.counts.failed;
            }
        }
        totals
    }

    /// True if every entity type was processed and no row failed
    pub fn is_complete(&self) -> bool {
        self.aborted_at.is_none() && self.phase_error.is_none() && self.failures.is_empty()
    }

    /// Per-entity table followed by the failure list
    pub fn render_table(&self) -> String {
        let width = self
            .entities
            .iter()
            .map(|r| r.entity.len())
            .chain(std::iter::once("entity".len()))
            .max()
            .unwrap_or(6);

        let mut out = String::new();
        out.push_str(&format!(
            "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}  status\n",
            "entity", "inserted", "updated", "skipped", "failed"
        ));
        for report in &self.entities {
            let c = report.counts;
            out.push_str(&format!(
                "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}  {}\n",
                report.entity,
                c.inserted,
                c.updated,
                c.skipped,
                c.failed,
                report.status.as_str()
            ));
        }
        let t = self.totals();
        out.push_str(&format!(
            "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}\n",
            "total", t.inserted, t.updated, t.skipped, t.failed
        ));

        for report in self.entities.iter().filter(|r| !r.unknown_fields.is_empty()) {
            out.push_str(&format!(
                "ignored fields in {}: {}\n",
                report.entity,
                report.unknown_fields.join(", ")
            ));
        }
        for section in &self.skipped_sections {
            out.push_str(&format!("skipped unknown section: {}\n", section));
        }
        if !self.failures.is_empty() {
            out.push_str(&format!("\n{} failed row(s):\n", self.failures.len()));
            for failure in &self.failures {
                out.push_str(&format!("  {}\n", failure));
            }
        }
        if let Some(entity) = self.aborted_at {
            out.push_str(&format!("\naborted at {}", entity));
            if let Some(e) = &self.phase_error {
                out.push_str(&format!(": {}", e));
            }
            out.push('\n');
            if !self.not_processed.is_empty() {
                out.push_str(&format!("not processed: {}\n", self.not_processed.join(", ")));
            }
        }
        out
    }
}

impl fmt::Display for RestoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.totals();
        write!(
            f,
            "restore of {} ({}): {} inserted, {} updated, {} skipped, {} failed",
            self.source, self.policy, t.inserted, t.updated, t.skipped, t.failed
        )?;
        if self.dry_run {
            f.write_str(" [dry run]")?;
        }
        if let Some(entity) = self.aborted_at {
            write!(f, ", aborted at {}", entity)?;
        }
        Ok(())
    }
}
