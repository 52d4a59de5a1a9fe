//! Error types for access control operations
//!
//! This module defines all error types that can occur while administering
//! roles and subjects or resolving permissions.

use thiserror::Error;

/// Access control error types.
///
/// Every failure is distinguishable by kind so callers can tell a denied
/// permission from an unknown entity, an invalid argument or a rejected
/// hierarchy edge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RbacError {
    /// Empty identifier, malformed permission node, unregistered node, bad payload
    #[error("{0}")]
    InvalidArgument(String),

    /// Subject, role, node or edge does not exist
    #[error("{0}")]
    NotFound(String),

    /// Subject, role or node is already registered
    #[error("{0}")]
    AlreadyExists(String),

    /// Adding a hierarchy edge would create a cycle
    #[error("{0}")]
    Cycle(String),

    /// `assert_permission` found no matching grant
    #[error("{0}")]
    PermissionDenied(String),

    /// The storage provider failed to load or commit
    #[error("Storage error: {0}")]
    Storage(String),

    /// A snapshot document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for access control operations.
pub type RbacResult<T> = Result<T, RbacError>;

/// Fieldless discriminant of [`RbacError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`RbacError::InvalidArgument`]
    InvalidArgument,
    /// See [`RbacError::NotFound`]
    NotFound,
    /// See [`RbacError::AlreadyExists`]
    AlreadyExists,
    /// See [`RbacError::Cycle`]
    Cycle,
    /// See [`RbacError::PermissionDenied`]
    PermissionDenied,
    /// See [`RbacError::Storage`]
    Storage,
    /// See [`RbacError::Serialization`]
    Serialization,
}

impl RbacError {
    /// `InvalidArgument` for an empty subject id.
    pub fn empty_subject() -> Self {
        RbacError::InvalidArgument("Subject name cannot be empty!".to_string())
    }

    /// `InvalidArgument` for an empty role id.
    pub fn empty_role() -> Self {
        RbacError::InvalidArgument("Role name cannot be empty!".to_string())
    }

    /// `NotFound` for an unregistered subject.
    pub fn unknown_subject(subject: &str) -> Self {
        RbacError::NotFound(format!("Subject '{subject}' does not exist!"))
    }

    /// `NotFound` for an unregistered role.
    pub fn unknown_role(role: &str) -> Self {
        RbacError::NotFound(format!("Role '{role}' does not exist!"))
    }

    /// `Cycle` for a rejected hierarchy edge.
    pub fn cycle() -> Self {
        RbacError::Cycle("Desired hierarchy would create a cycle!".to_string())
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RbacError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RbacError::NotFound(_) => ErrorKind::NotFound,
            RbacError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            RbacError::Cycle(_) => ErrorKind::Cycle,
            RbacError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            RbacError::Storage(_) => ErrorKind::Storage,
            RbacError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Check if this error originates outside the caller's request.
    ///
    /// Denials, unknown entities and invalid arguments are expected
    /// outcomes and should not be logged as errors.
    pub fn is_server_error(&self) -> bool {
        matches!(self, RbacError::Storage(_) | RbacError::Serialization(_))
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            RbacError::InvalidArgument(_) => "INVALID_ARGUMENT",
            RbacError::NotFound(_) => "NOT_FOUND",
            RbacError::AlreadyExists(_) => "ALREADY_EXISTS",
            RbacError::Cycle(_) => "CYCLE",
            RbacError::PermissionDenied(_) => "PERMISSION_DENIED",
            RbacError::Storage(_) => "STORAGE_ERROR",
            RbacError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}
