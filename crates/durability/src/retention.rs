//! Retention of snapshot files
//!
//! # Policy
//!
//! - **max_count**: keep only the N most recent snapshots
//! - **max_age**: delete snapshots older than `now - max_age`
//!
//! Both limits are optional and combine: a file is deleted if it breaks
//! either one. The most recent snapshot is never deleted, whatever the
//! policy says, so a directory that had snapshots keeps at least one.
//!
//! Snapshots are dated by the timestamp in their file name (modification
//! time when the name carries none). A file that cannot be deleted is
//! logged, reported and skipped; the pass continues.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::SnapshotResult;
use crate::reader::{list_snapshots, SnapshotFile};

/// Retention policy for a snapshot directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    /// Keep at most this many snapshots (at least 1)
    pub max_count: Option<usize>,
    /// Delete snapshots older than this (positive)
    pub max_age: Option<Duration>,
}

/// Invalid retention settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetentionPolicyError {
    /// max_count of zero
    #[error("max_count must be at least 1")]
    ZeroCount,
    /// max_age of zero or less
    #[error("max_age must be positive")]
    NonPositiveAge,
}

/// A snapshot file that could not be deleted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to delete snapshot {}: {message}", .path.display())]
pub struct RetentionIoError {
    /// File that was left in place
    pub path: PathBuf,
    /// Underlying I/O error text
    pub message: String,
}

/// Outcome of one retention pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Files left in place by the policy, newest first
    pub kept: Vec<PathBuf>,
    /// Files deleted
    pub deleted: Vec<PathBuf>,
    /// Files the policy selected but that could not be deleted
    pub failures: Vec<RetentionIoError>,
}

impl RetentionPolicy {
    /// Keep everything
    pub fn keep_all() -> Self {
        RetentionPolicy::default()
    }

    /// Keep the `n` most recent snapshots
    pub fn keep_last(n: usize) -> Self {
        RetentionPolicy {
            max_count: Some(n),
            max_age: None,
        }
    }

    /// Keep snapshots younger than `age`
    pub fn keep_for(age: Duration) -> Self {
        RetentionPolicy {
            max_count: None,
            max_age: Some(age),
        }
    }

    /// Build and validate a policy from a count and an age in days
    pub fn from_limits(
        max_count: Option<usize>,
        max_age_days: Option<u32>,
    ) -> Result<Self, RetentionPolicyError> {
        let policy = RetentionPolicy {
            max_count,
            max_age: max_age_days.map(|d| Duration::days(i64::from(d))),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the limits
    pub fn validate(&self) -> Result<(), RetentionPolicyError> {
        if self.max_count == Some(0) {
            return Err(RetentionPolicyError::ZeroCount);
        }
        if let Some(age) = self.max_age {
            if age <= Duration::zero() {
                return Err(RetentionPolicyError::NonPositiveAge);
            }
        }
        Ok(())
    }

    /// True if the policy never deletes anything
    pub fn is_keep_all(&self) -> bool {
        self.max_count.is_none() && self.max_age.is_none()
    }

    /// Decide which of `files` (newest first) to delete
    ///
    /// Returns one flag per file. The first file is never selected.
    pub fn select_for_deletion(&self, files: &[SnapshotFile], now: DateTime<Utc>) -> Vec<bool> {
        files
            .iter()
            .enumerate()
            .map(|(rank, file)| {
                if rank == 0 {
                    return false;
                }
                let over_count = self.max_count.map(|n| rank >= n).unwrap_or(false);
                let too_old = self
                    .max_age
                    .map(|age| now - file.created_at > age)
                    .unwrap_or(false);
                over_count || too_old
            })
            .collect()
    }
}

/// Apply `policy` to `dir` as of now
pub fn apply_retention(dir: &Path, policy: &RetentionPolicy) -> SnapshotResult<RetentionReport> {
    apply_retention_at(dir, policy, Utc::now())
}

/// Apply `policy` to `dir` as of `now`
///
/// # Errors
///
/// Only a failure to list the directory is an error. Failed deletions are
/// collected in [`RetentionReport::failures`].
pub fn apply_retention_at(
    dir: &Path,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> SnapshotResult<RetentionReport> {
    let files = list_snapshots(dir)?;
    let report = prune(files, policy, now, |path| std::fs::remove_file(path));

    info!(
        target: "fleetvault::retention",
        dir = %dir.display(),
        kept = report.kept.len(),
        deleted = report.deleted.len(),
        failed = report.failures.len(),
        "Retention pass complete"
    );
    Ok(report)
}

fn prune<F>(
    files: Vec<SnapshotFile>,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    mut remove: F,
) -> RetentionReport
where
    F: FnMut(&Path) -> std::io::Result<()>,
{
    let doomed = policy.select_for_deletion(&files, now);

    let mut report = RetentionReport::default();
    for (file, delete) in files.into_iter().zip(doomed) {
        if !delete {
            report.kept.push(file.path);
            continue;
        }
        match remove(&file.path) {
            Ok(()) => report.deleted.push(file.path),
            Err(e) => {
                warn!(
                    target: "fleetvault::retention",
                    path = %file.path.display(),
                    error = %e,
                    "Failed to delete snapshot, skipping"
                );
                report.failures.push(RetentionIoError {
                    path: file.path,
                    message: e.to_string(),
                });
            }
        }
    }
    report
}
