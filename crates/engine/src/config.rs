//! Pipeline configuration via `fleetvault.toml`
//!
//! One file next to the database holds the settings every command shares:
//! where the store lives, where snapshots go, how long they are kept and
//! how restores treat existing rows. `fleetvault init` writes the commented
//! default; command-line flags override individual values.

use std::path::{Path, PathBuf};

use fleetvault_durability::{RetentionPolicy, RetentionPolicyError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::ConflictPolicy;

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "fleetvault.toml";

/// Configuration failure
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this layout
    #[error("Failed to parse config file '{}': {message}", .path.display())]
    Parse {
        /// Config path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// A value is out of range or not recognised
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// File could not be written
    #[error("Failed to write config file '{}': {message}", .path.display())]
    Write {
        /// Config path
        path: PathBuf,
        /// Underlying error text
        message: String,
    },
}

impl From<RetentionPolicyError> for ConfigError {
    fn from(e: RetentionPolicyError) -> Self {
        ConfigError::Invalid(format!("retention: {}", e))
    }
}

/// `[retention]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Keep at most this many snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,
    /// Delete snapshots older than this many days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,
}

/// `[restore]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// `"skip"`, `"overwrite"` or `"abort-on-error"`
    #[serde(default = "default_policy_str")]
    pub policy: String,
    /// Simulate restores without writing
    #[serde(default)]
    pub dry_run: bool,
}

fn default_policy_str() -> String {
    ConflictPolicy::default().as_str().to_string()
}

impl Default for RestoreConfig {
    fn default() -> Self {
        RestoreConfig {
            policy: default_policy_str(),
            dry_run: false,
        }
    }
}

/// Configuration loaded from `fleetvault.toml`
///
/// # Example
///
/// ```toml
/// database = "fleet.db"
/// snapshot_dir = "snapshots"
///
/// [retention]
/// max_count = 30
///
/// [restore]
/// policy = "overwrite"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetvaultConfig {
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Directory snapshots are written to and listed from
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
    /// Source identifier recorded in snapshots (defaults to the database path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// tracing filter used when `RUST_LOG` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    /// Snapshot retention
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Restore defaults
    #[serde(default)]
    pub restore: RestoreConfig,
}

fn default_database() -> PathBuf {
    PathBuf::from("fleet.db")
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

impl Default for FleetvaultConfig {
    fn default() -> Self {
        FleetvaultConfig {
            database: default_database(),
            snapshot_dir: default_snapshot_dir(),
            source: None,
            log_filter: None,
            retention: RetentionConfig::default(),
            restore: RestoreConfig::default(),
        }
    }
}

impl FleetvaultConfig {
    /// Parse the restore policy string
    pub fn conflict_policy(&self) -> Result<ConflictPolicy, ConfigError> {
        self.restore.policy.parse()
    }

    /// Build the retention policy from the `[retention]` section
    pub fn retention_policy(&self) -> Result<RetentionPolicy, ConfigError> {
        Ok(RetentionPolicy::from_limits(
            self.retention.max_count,
            self.retention.max_age_days,
        )?)
    }

    /// Check every value that has a restricted range
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.conflict_policy()?;
        self.retention_policy()?;
        Ok(())
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# fleetvault configuration
#
# SQLite database holding the HR and fleet tables
database = "fleet.db"

# Directory snapshot files are written to
snapshot_dir = "snapshots"

# Identifier recorded in each snapshot (default: the database path)
# source = "hr-main"

# Log filter used when RUST_LOG is unset (default: "info")
# log_filter = "fleetvault=debug"

[retention]
# Keep at most this many snapshots; the newest is always kept
# max_count = 30
# Delete snapshots older than this many days
# max_age_days = 90

[restore]
# What to do with rows whose natural key already exists:
#   "skip"           = keep the existing row (default)
#   "overwrite"      = replace it with the snapshot's values
#   "abort-on-error" = stop at the first collision or failed row
policy = "skip"
dry_run = false
"#
    }

    /// Read, parse and validate config from a file path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FleetvaultConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default config file if it does not already exist
    ///
    /// Returns true if the file was created.
    pub fn write_default_if_missing(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_toml()).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(true)
    }

    /// Serialize this config to TOML and write it to the given path
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = FleetvaultConfig::default();
        assert_eq!(config.database, PathBuf::from("fleet.db"));
        assert_eq!(config.conflict_policy().unwrap(), ConflictPolicy::Skip);
        assert!(config.retention_policy().unwrap().is_keep_all());
    }

    #[test]
    fn default_toml_parses_to_defaults() {
        let config: FleetvaultConfig = toml::from_str(FleetvaultConfig::default_toml()).unwrap();
        assert_eq!(config, FleetvaultConfig::default());
    }

    #[test]
    fn parse_sections() {
        let config: FleetvaultConfig = toml::from_str(
            "snapshot_dir = \"/var/backups\"\n\
             [retention]\nmax_count = 3\nmax_age_days = 7\n\
             [restore]\npolicy = \"overwrite\"\n",
        )
        .unwrap();
        assert_eq!(config.snapshot_dir, PathBuf::from("/var/backups"));
        assert_eq!(config.conflict_policy().unwrap(), ConflictPolicy::Overwrite);
        let retention = config.retention_policy().unwrap();
        assert_eq!(retention.max_count, Some(3));
        assert_eq!(retention.max_age, Some(chrono::Duration::days(7)));
    }

    #[test]
    fn invalid_policy_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[restore]\npolicy = \"merge\"\n").unwrap();
        assert!(matches!(
            FleetvaultConfig::from_file(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn zero_retention_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[retention]\nmax_count = 0\n").unwrap();
        let err = FleetvaultConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("max_count"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "database = [").unwrap();
        assert!(matches!(
            FleetvaultConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn write_default_creates_file_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(FleetvaultConfig::write_default_if_missing(&path).unwrap());

        std::fs::write(&path, "database = \"other.db\"\n").unwrap();
        assert!(!FleetvaultConfig::write_default_if_missing(&path).unwrap());
        let config = FleetvaultConfig::from_file(&path).unwrap();
        assert_eq!(config.database, PathBuf::from("other.db"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let config = FleetvaultConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, FleetvaultConfig::default());
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = FleetvaultConfig {
            source: Some("hr-main".to_string()),
            retention: RetentionConfig {
                max_count: Some(10),
                max_age_days: None,
            },
            restore: RestoreConfig {
                policy: "abort-on-error".to_string(),
                dry_run: true,
            },
            ..FleetvaultConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(FleetvaultConfig::from_file(&path).unwrap(), config);
    }
}
