//! Snapshot reading and discovery

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::document::SnapshotDocument;
use crate::error::SnapshotResult;
use crate::writer::{SNAPSHOT_EXTENSION, SNAPSHOT_PREFIX};

/// Prefix of snapshot files exported by the legacy backup page
pub const LEGACY_PREFIX: &str = "backup_";

/// Load and version-check a snapshot file
pub fn read_snapshot(path: &Path) -> SnapshotResult<SnapshotDocument> {
    let text = fs::read_to_string(path)?;
    SnapshotDocument::from_json(&text)
}

/// A snapshot file found in a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    /// Full path
    pub path: PathBuf,
    /// Creation time, from the file name or else the modification time
    pub created_at: DateTime<Utc>,
}

/// Creation time encoded in a snapshot file name
///
/// Accepts `snapshot-YYYYMMDD_HHMMSS[-N].json` and the legacy
/// `backup_YYYYMMDD_HHMMSS.json`.
pub fn parse_snapshot_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = file_name.strip_suffix(&format!(".{}", SNAPSHOT_EXTENSION))?;
    let body = stem
        .strip_prefix(SNAPSHOT_PREFIX)
        .or_else(|| stem.strip_prefix(LEGACY_PREFIX))?;
    let stamp = body.get(..15)?;
    let rest = body.get(15..)?;
    if !rest.is_empty() && !is_collision_suffix(rest) {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Collision sequence of a snapshot written in an already-used second
///
/// `snapshot-..._HHMMSS-N.json` yields `N`; a name without a suffix yields 0.
pub fn collision_sequence(file_name: &str) -> u32 {
    file_name
        .strip_suffix(&format!(".{}", SNAPSHOT_EXTENSION))
        .and_then(|stem| stem.rsplit_once('-'))
        .filter(|(_, n)| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(0)
}

fn is_collision_suffix(rest: &str) -> bool {
    rest.strip_prefix('-')
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// True if `file_name` looks like a snapshot file
pub fn is_snapshot_file_name(file_name: &str) -> bool {
    !file_name.starts_with('.')
        && (file_name.starts_with(SNAPSHOT_PREFIX) || file_name.starts_with(LEGACY_PREFIX))
        && file_name.ends_with(&format!(".{}", SNAPSHOT_EXTENSION))
}

/// List snapshot files in `dir`, newest first
///
/// Files whose name carries no parseable timestamp are dated by their
/// modification time. Files from the same second are ordered by their
/// collision sequence, higher first.
pub fn list_snapshots(dir: &Path) -> SnapshotResult<Vec<SnapshotFile>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_snapshot_file_name(&name) || !entry.file_type()?.is_file() {
            continue;
        }
        let created_at = match parse_snapshot_timestamp(&name) {
            Some(ts) => ts,
            None => DateTime::<Utc>::from(entry.metadata()?.modified()?),
        };
        files.push(SnapshotFile {
            path: entry.path(),
            created_at,
        });
    }

    files.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| sequence_of(&b.path).cmp(&sequence_of(&a.path)))
            .then_with(|| b.path.cmp(&a.path))
    });
    Ok(files)
}

fn sequence_of(path: &Path) -> u32 {
    path.file_name()
        .map(|name| collision_sequence(&name.to_string_lossy()))
        .unwrap_or(0)
}
