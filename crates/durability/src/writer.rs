//! Crash-safe snapshot writer
//!
//! Uses the write-fsync-rename pattern for atomic snapshot creation.
//!
//! # Crash Safety
//!
//! 1. Write to a temporary file (`.snapshot-YYYYMMDD_HHMMSS.json.tmp`)
//! 2. Flush and fsync the temporary file
//! 3. Rename to the final path (`snapshot-YYYYMMDD_HHMMSS.json`)
//! 4. fsync the parent directory
//!
//! Either the complete snapshot exists under its final name or it does not.
//! On any error the temporary file is removed; a crash can still leave one
//! behind, which [`SnapshotWriter::cleanup_temp_files`] removes.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::document::SnapshotDocument;
use crate::error::{SnapshotError, SnapshotResult};

/// File-name prefix of snapshots written by this crate
pub const SNAPSHOT_PREFIX: &str = "snapshot-";
/// File-name extension of snapshots
pub const SNAPSHOT_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".snapshot-";
const TEMP_SUFFIX: &str = ".tmp";
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Snapshot writer with crash-safe semantics
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    snapshot_dir: PathBuf,
}

/// Information about a written snapshot
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// Final path of the snapshot file
    pub path: PathBuf,
    /// Creation time recorded in the document
    pub created_at: DateTime<Utc>,
    /// Number of records written
    pub records: usize,
    /// File size in bytes
    pub bytes: u64,
}

/// Removes the temporary file unless disarmed
struct TempFileGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl Drop for TempFileGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(self.path) {
                warn!(
                    target: "fleetvault::snapshot",
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove temporary snapshot file"
                );
            }
        }
    }
}

impl SnapshotWriter {
    /// Create a writer for `snapshot_dir`
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> SnapshotResult<Self> {
        let snapshot_dir = snapshot_dir.into();
        std::fs::create_dir_all(&snapshot_dir)?;
        Ok(SnapshotWriter { snapshot_dir })
    }

    /// Get the snapshot directory
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Write `document` under a unique name derived from its creation time
    ///
    /// A second snapshot within the same second gets a `-1`, `-2`, ...
    /// suffix.
    pub fn write(&self, document: &SnapshotDocument) -> SnapshotResult<SnapshotInfo> {
        let final_path = self.unique_path(&document.created_at)?;
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = self
            .snapshot_dir
            .join(format!(".{}{}", file_name, TEMP_SUFFIX));

        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)?;
        let mut guard = TempFileGuard {
            path: &temp_path,
            armed: true,
        };

        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, document)?;
        out.write_all(b"\n")?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        let bytes = file.metadata()?.len();
        drop(file);

        std::fs::rename(&temp_path, &final_path)?;
        guard.armed = false;

        let dir = File::open(&self.snapshot_dir)?;
        dir.sync_all()?;

        let records = document.total_records();
        info!(
            target: "fleetvault::snapshot",
            path = %final_path.display(),
            records,
            bytes,
            "Snapshot written"
        );

        Ok(SnapshotInfo {
            path: final_path,
            created_at: document.created_at,
            records,
            bytes,
        })
    }

    /// Clean up incomplete temporary files
    ///
    /// Removes temporary files left behind by interrupted writes. Returns
    /// how many were removed.
    pub fn cleanup_temp_files(&self) -> SnapshotResult<usize> {
        let mut count = 0;

        if !self.snapshot_dir.exists() {
            return Ok(0);
        }

        for entry in std::fs::read_dir(&self.snapshot_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX) {
                std::fs::remove_file(entry.path())?;
                debug!(target: "fleetvault::snapshot", file = %name, "Removed stale temporary file");
                count += 1;
            }
        }

        Ok(count)
    }

    fn unique_path(&self, created_at: &DateTime<Utc>) -> SnapshotResult<PathBuf> {
        let stem = snapshot_stem(created_at);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.{}", stem, SNAPSHOT_EXTENSION)
            } else {
                format!("{}-{}.{}", stem, attempt, SNAPSHOT_EXTENSION)
            };
            let path = self.snapshot_dir.join(name);
            if !path.exists() {
                return Ok(path);
            }
        }
        Err(SnapshotError::NameExhausted(self.snapshot_dir.join(stem)))
    }
}

/// File stem of a snapshot created at `created_at`
pub fn snapshot_stem(created_at: &DateTime<Utc>) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, created_at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{EntitySection, Record};
    use chrono::TimeZone;
    use serde_json::json;

    fn document() -> SnapshotDocument {
        let mut doc = SnapshotDocument::new(
            "test-db",
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap(),
        );
        let mut record = Record::new();
        record.insert("id".into(), json!(1));
        record.insert("name".into(), json!("Fleet"));
        doc.sections.push(EntitySection {
            entity: "department".into(),
            records: vec![record],
        });
        doc
    }

    #[test]
    fn test_write_creates_timestamped_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(temp_dir.path()).unwrap();

        let info = writer.write(&document()).unwrap();

        assert!(info.path.exists());
        assert!(info
            .path
            .to_string_lossy()
            .ends_with("snapshot-20260301_083000.json"));
        assert_eq!(info.records, 1);
        assert!(info.bytes > 0);
    }

    #[test]
    fn test_same_second_gets_suffix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(temp_dir.path()).unwrap();

        let first = writer.write(&document()).unwrap();
        let second = writer.write(&document()).unwrap();
        let third = writer.write(&document()).unwrap();

        assert_ne!(first.path, second.path);
        assert!(second
            .path
            .to_string_lossy()
            .ends_with("snapshot-20260301_083000-1.json"));
        assert!(third
            .path
            .to_string_lossy()
            .ends_with("snapshot-20260301_083000-2.json"));
    }

    #[test]
    fn test_no_temp_file_left_after_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(temp_dir.path()).unwrap();
        writer.write(&document()).unwrap();

        let names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["snapshot-20260301_083000.json".to_string()]);
    }

    #[test]
    fn test_written_file_parses_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(temp_dir.path()).unwrap();
        let info = writer.write(&document()).unwrap();

        let text = std::fs::read_to_string(&info.path).unwrap();
        let parsed = SnapshotDocument::from_json(&text).unwrap();
        assert_eq!(parsed.records("department").unwrap()[0]["name"], json!("Fleet"));
    }

    #[test]
    fn test_cleanup_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(temp_dir.path()).unwrap();

        std::fs::write(
            temp_dir.path().join(".snapshot-20260228_230000.json.tmp"),
            b"{\"version\"",
        )
        .unwrap();
        writer.write(&document()).unwrap();

        assert_eq!(writer.cleanup_temp_files().unwrap(), 1);
        assert_eq!(writer.cleanup_temp_files().unwrap(), 0);
        assert!(temp_dir
            .path()
            .join("snapshot-20260301_083000.json")
            .exists());
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let writer = SnapshotWriter::new(&nested).unwrap();
        assert_eq!(writer.snapshot_dir(), nested.as_path());
        assert!(nested.is_dir());
    }
}
