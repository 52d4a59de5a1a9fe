//! # Identifiers
//!
//! Opaque, non-empty identifiers for subjects and roles.
//! Both are validated once at construction and are cheap to clone and compare.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::{RbacError, RbacResult};

/// Identifier of a subject (a user or system principal).
///
/// # Example
///
/// ```
/// use permgraph_rbac::SubjectId;
///
/// let alex = SubjectId::new("Alex").unwrap();
/// assert_eq!(alex.as_str(), "Alex");
/// assert!(SubjectId::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

/// Identifier of a role.
///
/// # Example
///
/// ```
/// use permgraph_rbac::RoleId;
///
/// let admin = RoleId::new("admin").unwrap();
/// assert_eq!(admin.to_string(), "admin");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(String);

impl SubjectId {
    /// Create a subject identifier.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `id` is empty.
    pub fn new(id: impl Into<String>) -> RbacResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(RbacError::empty_subject());
        }
        Ok(Self(id))
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RoleId {
    /// Create a role identifier.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `id` is empty.
    pub fn new(id: impl Into<String>) -> RbacResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(RbacError::empty_role());
        }
        Ok(Self(id))
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_id_conversions {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $ty {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = RbacError;

            fn try_from(value: String) -> RbacResult<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = RbacError;

            fn try_from(value: &str) -> RbacResult<Self> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> String {
                value.0
            }
        }

        impl PartialEq<str> for $ty {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $ty {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

impl_id_conversions!(SubjectId);
impl_id_conversions!(RoleId);
