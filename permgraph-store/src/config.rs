//! Store configuration.
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for local development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::format::SnapshotFormat;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Configuration of a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the snapshot file. The extension selects the format.
    pub data_file: PathBuf,

    /// Whether JSON output is indented.
    pub pretty: bool,

    /// Whether a missing file is created on load instead of failing.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("permgraph.json"),
            pretty: true,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Configuration for the given file with default flags.
    pub fn for_file(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PERMGRAPH_DATA_FILE`: Snapshot file path (default: permgraph.json)
    /// - `PERMGRAPH_PRETTY`: Indent JSON output (default: true)
    /// - `PERMGRAPH_CREATE_IF_MISSING`: Create a missing file on load (default: true)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            data_file: std::env::var("PERMGRAPH_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(default.data_file),
            pretty: std::env::var("PERMGRAPH_PRETTY")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.pretty),
            create_if_missing: std::env::var("PERMGRAPH_CREATE_IF_MISSING")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.create_if_missing),
        }
    }

    /// Check that the file path is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.format().map(|_| ())
    }

    /// Snapshot format derived from the file extension.
    ///
    /// # Errors
    ///
    /// `InvalidValue` for an empty path or an unsupported extension
    pub fn format(&self) -> Result<SnapshotFormat, ConfigError> {
        if self.data_file.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "PERMGRAPH_DATA_FILE".to_string(),
                message: "path cannot be empty".to_string(),
            });
        }
        SnapshotFormat::from_path(&self.data_file)
    }
}
