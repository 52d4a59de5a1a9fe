//! Snapshot file formats

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::config::ConfigError;
use crate::error::StoreResult;

/// Encoding of a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// `.json`
    Json,
    /// `.yaml` or `.yml`
    Yaml,
}

impl SnapshotFormat {
    /// Pick the format from a file extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// `InvalidValue` if the extension is missing or not supported
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(ConfigError::InvalidValue {
                key: "PERMGRAPH_DATA_FILE".to_string(),
                message: format!(
                    "unsupported snapshot file '{}', expected .json, .yaml or .yml",
                    path.display()
                ),
            }),
        }
    }

    /// Encode a value. `pretty` only affects JSON.
    pub fn encode<T: Serialize>(&self, value: &T, pretty: bool) -> StoreResult<String> {
        Ok(match self {
            Self::Json if pretty => serde_json::to_string_pretty(value)?,
            Self::Json => serde_json::to_string(value)?,
            Self::Yaml => serde_yaml::to_string(value)?,
        })
    }

    /// Decode a value.
    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> StoreResult<T> {
        Ok(match self {
            Self::Json => serde_json::from_str(text)?,
            Self::Yaml => serde_yaml::from_str(text)?,
        })
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}
