//! Store configuration
//!
//! Read from YAML, e.g.:
//!
//! ```yaml
//! path: world/task.db
//! pragmas:
//!   journal_mode: wal
//!   synchronous: normal
//!   cache_size: 10000
//!   busy_timeout_ms: 5000
//!   foreign_keys: true
//! backup:
//!   pages_per_step: 64
//!   pause_ms: 0
//!   progress: false
//! ```
//!
//! Every key is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// `SQLite` journal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Truncate,
    Memory,
}

impl JournalMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
            Self::Truncate => "truncate",
            Self::Memory => "memory",
        }
    }
}

/// `SQLite` synchronous level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Off,
    #[default]
    Normal,
    Full,
}

impl SyncMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Normal => "normal",
            Self::Full => "full",
        }
    }
}

/// Connection pragmas, applied on every open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PragmaConfig {
    pub journal_mode: JournalMode,
    pub synchronous: SyncMode,
    pub cache_size: i64,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
}

impl Default for PragmaConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            synchronous: SyncMode::Normal,
            cache_size: 10_000,
            busy_timeout_ms: 5_000,
            foreign_keys: true,
        }
    }
}

/// Page-copy settings for snapshots and restores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Pages copied per backup step
    pub pages_per_step: i32,
    /// Sleep between retries when the source is busy
    pub pause_ms: u64,
    /// Log each copy step at info level instead of debug
    pub progress: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            pages_per_step: 64,
            pause_ms: 0,
            progress: false,
        }
    }
}

/// Configuration of one session's durable store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Durable file mirrored by the in-memory database
    pub path: PathBuf,
    pub pragmas: PragmaConfig,
    pub backup: BackupConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(Self::FILE_NAME),
            pragmas: PragmaConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl StoreConfig {
    /// File name used inside a world directory
    pub const FILE_NAME: &'static str = "task.db";

    /// Default configuration storing `task.db` inside `world`
    pub fn for_world(world: impl AsRef<Path>) -> Self {
        Self {
            path: world.as_ref().join(Self::FILE_NAME),
            ..Default::default()
        }
    }

    /// Load a YAML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: StoreConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Anchor a relative store path at `world`.
    pub fn resolve(mut self, world: &Path) -> Self {
        if self.path.is_relative() {
            self.path = world.join(&self.path);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "store path cannot be empty".to_string(),
            });
        }
        if self.path.is_dir() {
            return Err(Error::Config {
                message: format!("store path '{}' is a directory", self.path.display()),
            });
        }
        if self.backup.pages_per_step <= 0 {
            return Err(Error::Config {
                message: format!("backup.pages_per_step must be positive, got {}", self.backup.pages_per_step),
            });
        }
        Ok(())
    }
}
