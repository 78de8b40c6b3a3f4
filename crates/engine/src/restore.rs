//! Restore engine
//!
//! Loads a snapshot document into a store one entity type at a time, in
//! restore order. Each entity type is one phase with its own session:
//!
//! 1. decode the record against the descriptor
//! 2. rewrite foreign keys from snapshot ids to target ids via the remap
//! 3. look the row up by natural key and let the conflict policy decide
//! 4. insert, update or skip, and record where the row ended up
//!
//! # Design Notes
//!
//! - A committed phase stays committed; a later failure never undoes it.
//! - A row failure is tallied and the phase continues, except under
//!   `abort-on-error`, where the phase is rolled back and the run stops.
//! - A store failure (anything that is not about one row) rolls back the
//!   phase and stops the run. The summary is still returned.
//! - Remap entries from a phase become visible to later phases only once
//!   the phase commits.
//! - Dry runs decide against the live store but roll every phase back,
//!   handing out negative ids so dependents can still resolve.

use std::collections::BTreeSet;
use std::path::Path;

use fleetvault_core::{descriptor, restore_order, EntityDescriptor, RowId};
use fleetvault_durability::{
    decode_record, read_snapshot, Record, SnapshotDocument, SnapshotError,
    SNAPSHOT_FORMAT_VERSION,
};
use fleetvault_storage::{Session, StorageError, StorageResult, Store};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{EngineResult, RowError};
use crate::policy::{ConflictPolicy, Decision};
use crate::remap::IdRemap;
use crate::summary::{EntityCounts, EntityReport, PhaseStatus, RestoreSummary, RowFailure};

/// Options for one restore run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// How rows with an existing natural key are treated
    pub policy: ConflictPolicy,
    /// Decide everything, write nothing
    pub dry_run: bool,
}

impl RestoreOptions {
    /// Options with the given policy
    pub fn with_policy(policy: ConflictPolicy) -> Self {
        RestoreOptions {
            policy,
            dry_run: false,
        }
    }

    /// Turn dry-run mode on or off
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Restores snapshot documents into a store
pub struct RestoreEngine<'a> {
    store: &'a dyn Store,
    options: RestoreOptions,
}

/// What happened to one row that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Inserted(RowId),
    Updated(RowId),
    Skipped(RowId),
}

/// How a phase ended, before it is written into the summary
enum PhaseEnd {
    Completed,
    Aborted,
    StoreFailed(StorageError),
}

/// Per-run state threaded through the phases
struct RunState {
    remap: IdRemap,
    next_simulated_id: i64,
}

impl RunState {
    fn simulated_id(&mut self) -> RowId {
        self.next_simulated_id -= 1;
        RowId(self.next_simulated_id)
    }
}

/// Tallies and staged remap entries of one phase
struct PhaseState {
    counts: EntityCounts,
    staged: IdRemap,
    unknown_fields: BTreeSet<String>,
}

impl<'a> RestoreEngine<'a> {
    /// Engine over `store`
    pub fn new(store: &'a dyn Store, options: RestoreOptions) -> Self {
        RestoreEngine { store, options }
    }

    /// Options in effect
    pub fn options(&self) -> RestoreOptions {
        self.options
    }

    /// Read a snapshot file and restore it
    pub fn restore_file(&self, path: &Path) -> EngineResult<RestoreSummary> {
        let document = read_snapshot(path)?;
        info!(
            target: "fleetvault::restore",
            path = %path.display(),
            records = document.total_records(),
            "Loaded snapshot"
        );
        self.restore(&document)
    }

    /// Restore `document`
    ///
    /// # Errors
    ///
    /// - `Schema`: the restore order failed validation (`DependencyCycle`)
    /// - `Snapshot`: the document is not at the supported format version
    ///
    /// Row failures and store failures during a phase are reported in the
    /// returned summary instead.
    pub fn restore(&self, document: &SnapshotDocument) -> EngineResult<RestoreSummary> {
        if document.version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: document.version.to_string(),
                supported: SNAPSHOT_FORMAT_VERSION,
            }
            .into());
        }
        let order = restore_order()?;

        let mut summary = RestoreSummary::new(
            document.source.clone(),
            document.created_at,
            self.options.policy,
            self.options.dry_run,
        );
        for section in &document.sections {
            if descriptor(&section.entity).is_none() {
                warn!(
                    target: "fleetvault::restore",
                    section = %section.entity,
                    records = section.records.len(),
                    "Skipping unknown snapshot section"
                );
                summary.skipped_sections.push(section.entity.clone());
            }
        }

        let phases: Vec<(&'static EntityDescriptor, &[Record])> = order
            .iter()
            .filter_map(|entity| document.records(entity.name).map(|records| (*entity, records)))
            .collect();

        info!(
            target: "fleetvault::restore",
            source = %document.source,
            policy = %self.options.policy,
            dry_run = self.options.dry_run,
            phases = phases.len(),
            "Restore started"
        );

        let mut run = RunState {
            remap: IdRemap::new(),
            next_simulated_id: 0,
        };

        for (index, &(entity, records)) in phases.iter().enumerate() {
            let (phase, end) = self.run_phase(entity, records, &mut run, &mut summary);
            let status = match &end {
                PhaseEnd::Completed if self.options.dry_run => PhaseStatus::DryRun,
                PhaseEnd::Completed => PhaseStatus::Committed,
                PhaseEnd::Aborted => PhaseStatus::RolledBack,
                PhaseEnd::StoreFailed(_) => PhaseStatus::Failed,
            };
            info!(
                target: "fleetvault::restore",
                entity = entity.name,
                inserted = phase.counts.inserted,
                updated = phase.counts.updated,
                skipped = phase.counts.skipped,
                failed = phase.counts.failed,
                status = status.as_str(),
                "Phase finished"
            );
            summary.entities.push(EntityReport {
                entity: entity.name,
                counts: phase.counts,
                status,
                unknown_fields: phase.unknown_fields.into_iter().collect(),
            });

            let phase_error = match end {
                PhaseEnd::Completed => {
                    run.remap.extend(phase.staged);
                    continue;
                }
                PhaseEnd::Aborted => None,
                PhaseEnd::StoreFailed(e) => Some(e.to_string()),
            };
            summary.phase_error = phase_error;
            summary.aborted_at = Some(entity.name);
            summary.not_processed = phases[index + 1..].iter().map(|(e, _)| e.name).collect();
            warn!(
                target: "fleetvault::restore",
                entity = entity.name,
                not_processed = summary.not_processed.len(),
                "Restore stopped early"
            );
            break;
        }

        let totals = summary.totals();
        info!(
            target: "fleetvault::restore",
            inserted = totals.inserted,
            updated = totals.updated,
            skipped = totals.skipped,
            failed = totals.failed,
            complete = summary.is_complete(),
            "Restore finished"
        );
        Ok(summary)
    }

    /// Run one entity-type phase in its own session
    fn run_phase(
        &self,
        entity: &'static EntityDescriptor,
        records: &[Record],
        run: &mut RunState,
        summary: &mut RestoreSummary,
    ) -> (PhaseState, PhaseEnd) {
        let mut phase = PhaseState {
            counts: EntityCounts::default(),
            staged: IdRemap::new(),
            unknown_fields: BTreeSet::new(),
        };
        debug!(
            target: "fleetvault::restore",
            entity = entity.name,
            records = records.len(),
            "Phase started"
        );

        let mut session = match self.store.begin() {
            Ok(session) => session,
            Err(e) => return (phase, PhaseEnd::StoreFailed(e)),
        };

        let mut aborted = false;
        for record in records {
            match self.restore_row(session.as_mut(), entity, record, run, &mut phase) {
                Ok(Ok(outcome)) => {
                    debug!(
                        target: "fleetvault::restore",
                        entity = entity.name,
                        snapshot_id = snapshot_id_of(record),
                        outcome = ?outcome,
                        "Row restored"
                    );
                    match outcome {
                        RowOutcome::Inserted(_) => phase.counts.inserted += 1,
                        RowOutcome::Updated(_) => phase.counts.updated += 1,
                        RowOutcome::Skipped(_) => phase.counts.skipped += 1,
                    }
                }
                Ok(Err(row_error)) => {
                    phase.counts.failed += 1;
                    let failure = RowFailure {
                        entity: entity.name,
                        snapshot_id: snapshot_id_of(record),
                        natural_key: natural_key_text(entity, record),
                        reason: row_error.to_string(),
                    };
                    warn!(
                        target: "fleetvault::restore",
                        entity = entity.name,
                        natural_key = %failure.natural_key,
                        kind = row_error.kind(),
                        reason = %failure.reason,
                        "Row failed"
                    );
                    summary.failures.push(failure);
                    if self.options.policy.aborts_on_error() {
                        aborted = true;
                        break;
                    }
                }
                Err(e) => {
                    discard(session, entity);
                    return (phase, PhaseEnd::StoreFailed(e));
                }
            }
        }

        if !phase.unknown_fields.is_empty() {
            warn!(
                target: "fleetvault::restore",
                entity = entity.name,
                fields = ?phase.unknown_fields,
                "Ignored fields not declared for this entity type"
            );
        }

        if aborted || self.options.dry_run {
            discard(session, entity);
            let end = if aborted {
                PhaseEnd::Aborted
            } else {
                PhaseEnd::Completed
            };
            return (phase, end);
        }

        match session.commit() {
            Ok(()) => (phase, PhaseEnd::Completed),
            Err(e) => (phase, PhaseEnd::StoreFailed(e)),
        }
    }

    /// Restore one record
    ///
    /// The outer error is a store failure that ends the phase; the inner
    /// one fails this row only.
    fn restore_row(
        &self,
        session: &mut (dyn Session + '_),
        entity: &'static EntityDescriptor,
        record: &Record,
        run: &mut RunState,
        phase: &mut PhaseState,
    ) -> StorageResult<Result<RowOutcome, RowError>> {
        let decoded = match decode_record(entity, record) {
            Ok(decoded) => decoded,
            Err(e) => return Ok(Err(e.into())),
        };
        phase.unknown_fields.extend(decoded.unknown_fields);

        let mut row = decoded.row;
        if let Err(e) = run.remap.rewrite_references(entity, &mut row) {
            return Ok(Err(e));
        }
        let key = match entity.natural_key_of(&row) {
            Ok(key) => key,
            Err(e) => return Ok(Err(RowError::ConstraintViolation(e.to_string()))),
        };

        let existing = session.find_by_natural_key(entity, &key)?;
        let decision = self
            .options
            .policy
            .decide(existing.as_ref().map(|s| &s.row), &row);

        let outcome = match (decision, existing) {
            (Decision::Conflict, _) => return Ok(Err(RowError::Conflict)),
            (Decision::Skip, Some(existing)) => RowOutcome::Skipped(existing.id),
            (Decision::Update, Some(existing)) => {
                if !self.options.dry_run {
                    if let Err(e) = session.update(entity, existing.id, &row) {
                        return row_level(e);
                    }
                }
                RowOutcome::Updated(existing.id)
            }
            (Decision::Insert, _) | (Decision::Skip | Decision::Update, None) => {
                let id = if self.options.dry_run {
                    run.simulated_id()
                } else {
                    match session.insert(entity, &row) {
                        Ok(id) => id,
                        Err(e) => return row_level(e),
                    }
                };
                RowOutcome::Inserted(id)
            }
        };

        let target = match outcome {
            RowOutcome::Inserted(id) | RowOutcome::Updated(id) | RowOutcome::Skipped(id) => id,
        };
        phase.staged.record(entity.name, decoded.id, target);
        Ok(Ok(outcome))
    }
}

/// Sort a store error into a row failure or a phase failure
fn row_level(e: StorageError) -> StorageResult<Result<RowOutcome, RowError>> {
    if e.is_row_level() {
        Ok(Err(RowError::ConstraintViolation(e.to_string())))
    } else {
        Err(e)
    }
}

fn discard(session: Box<dyn Session + '_>, entity: &'static EntityDescriptor) {
    if let Err(e) = session.rollback() {
        warn!(
            target: "fleetvault::restore",
            entity = entity.name,
            error = %e,
            "Rollback failed"
        );
    }
}

fn snapshot_id_of(record: &Record) -> Option<i64> {
    record.get("id").and_then(JsonValue::as_i64)
}

/// Natural key as written in the snapshot record
fn natural_key_text(entity: &'static EntityDescriptor, record: &Record) -> String {
    entity
        .natural_key
        .iter()
        .map(|field| match record.get(*field) {
            Some(JsonValue::String(s)) => s.clone(),
            None | Some(JsonValue::Null) => "?".to_string(),
            Some(other) => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
