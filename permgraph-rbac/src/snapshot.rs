//! Serialized snapshot document
//!
//! A hierarchical document with one collection of roles and one of subjects.
//! The permission representation is generic so both flavors share it:
//! [`Permission`](crate::Permission) records for the resource/action model and
//! serialized node strings for the permission-node tree.
//!
//! ```text
//! roles:
//!   admin:
//!     permissions: [...]
//!     children: [...]
//!     subjects: [...]
//! subjects:
//!   Alex:
//!     permissions: [...]
//! ```
//!
//! Empty lists are omitted when saving and default to empty when loading.
//! Defaults are given as function paths so `P` needs no `Default` bound.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::{RoleId, SubjectId};

/// Snapshot of a complete role graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<P> {
    /// Roles keyed by id
    #[serde(default = "BTreeMap::new")]
    pub roles: BTreeMap<RoleId, RoleRecord<P>>,
    /// Subjects keyed by id
    #[serde(default = "BTreeMap::new")]
    pub subjects: BTreeMap<SubjectId, SubjectRecord<P>>,
}

impl<P> Default for Snapshot<P> {
    fn default() -> Self {
        Self {
            roles: BTreeMap::new(),
            subjects: BTreeMap::new(),
        }
    }
}

impl<P> Snapshot<P> {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the snapshot holds neither roles nor subjects.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.subjects.is_empty()
    }

    /// Total number of hierarchy edges.
    pub fn edge_count(&self) -> usize {
        self.roles.values().map(|r| r.children.len()).sum()
    }

    /// Total number of permission grants across roles and subjects.
    pub fn grant_count(&self) -> usize {
        self.roles.values().map(|r| r.permissions.len()).sum::<usize>()
            + self.subjects.values().map(|s| s.permissions.len()).sum::<usize>()
    }
}

/// A role entry of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord<P> {
    /// Directly granted permissions
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<P>,
    /// Direct child roles (they inherit this role's permissions)
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RoleId>,
    /// Directly assigned subjects
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<SubjectId>,
}

impl<P> Default for RoleRecord<P> {
    fn default() -> Self {
        Self {
            permissions: Vec::new(),
            children: Vec::new(),
            subjects: Vec::new(),
        }
    }
}

/// A subject entry of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord<P> {
    /// Directly granted permissions
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<P>,
}

impl<P> Default for SubjectRecord<P> {
    fn default() -> Self {
        Self {
            permissions: Vec::new(),
        }
    }
}
