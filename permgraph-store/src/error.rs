//! Error types for snapshot persistence

use thiserror::Error;

use permgraph_rbac::RbacError;

use crate::config::ConfigError;

/// Persistence error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot content was rejected by the engine
    #[error(transparent)]
    Rbac(#[from] RbacError),

    /// Invalid store configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading or writing the snapshot file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding or decoding failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Check if this error should be treated as a server error.
    pub fn is_server_error(&self) -> bool {
        match self {
            StoreError::Rbac(e) => e.is_server_error(),
            StoreError::Config(_) => false,
            StoreError::Io(_) | StoreError::Json(_) | StoreError::Yaml(_) => true,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Rbac(e) => e.error_code(),
            StoreError::Config(_) => "CONFIG_ERROR",
            StoreError::Io(_) => "STORAGE_ERROR",
            StoreError::Json(_) | StoreError::Yaml(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<StoreError> for RbacError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rbac(e) => e,
            StoreError::Config(e) => RbacError::Storage(e.to_string()),
            StoreError::Io(e) => RbacError::Storage(e.to_string()),
            StoreError::Json(e) => RbacError::Serialization(e.to_string()),
            StoreError::Yaml(e) => RbacError::Serialization(e.to_string()),
        }
    }
}
