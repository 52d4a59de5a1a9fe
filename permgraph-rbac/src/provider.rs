//! Storage provider abstraction
//!
//! The engine keeps its working state in memory and hands every successful
//! mutation to a [`StorageProvider`] as a list of record-level [`Change`]s.
//! Cascades are already expanded, so record-oriented backends can apply the
//! list verbatim inside one transaction while document-oriented backends can
//! write the post-mutation state as a whole.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::directory::RbacState;
use crate::error::RbacResult;
use crate::ids::{RoleId, SubjectId};
use crate::permissions::{Permission, Policy};
use crate::snapshot::Snapshot;

/// A single record-level mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    /// A subject record was created
    CreateSubject { subject: SubjectId },
    /// A subject record was deleted (its assignments are removed by preceding records)
    DeleteSubject { subject: SubjectId },
    /// A role record was created
    CreateRole { role: RoleId },
    /// A role record was deleted (its policies, members and edges are removed by preceding records)
    DeleteRole { role: RoleId },
    /// A subject was assigned to a role
    AssignRole { subject: SubjectId, role: RoleId },
    /// A subject assignment was removed
    DeassignRole { subject: SubjectId, role: RoleId },
    /// A policy was created
    Grant { policy: Policy },
    /// A policy was removed
    Revoke { policy: Policy },
    /// A hierarchy edge was added
    AddEdge { parent: RoleId, child: RoleId },
    /// A hierarchy edge was removed
    RemoveEdge { parent: RoleId, child: RoleId },
}

/// Durable storage for roles, subjects, policies, assignments and edges.
///
/// `commit` must be all-or-nothing: when it returns an error nothing of the
/// change list may have been persisted. The engine only publishes the new
/// state after `commit` succeeded.
pub trait StorageProvider: Send + Sync {
    /// Load the persisted records, `None` if nothing was stored yet.
    fn load(&self) -> RbacResult<Option<Snapshot<Permission>>>;

    /// Persist a mutation.
    ///
    /// # Arguments
    ///
    /// * `changes` - The record-level changes, in application order
    /// * `state` - The complete state after applying `changes`
    fn commit(&self, changes: &[Change], state: &RbacState) -> RbacResult<()>;
}

/// In-memory storage provider.
///
/// Keeps the last committed snapshot and a journal of every committed change.
/// This is suitable for single-process applications and testing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot<Permission>>>,
    journal: Mutex<Vec<Change>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a snapshot.
    pub fn with_snapshot(snapshot: Snapshot<Permission>) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Every change committed so far, in order.
    pub fn journal(&self) -> Vec<Change> {
        self.journal.lock().clone()
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Option<Snapshot<Permission>> {
        self.snapshot.lock().clone()
    }
}

impl StorageProvider for MemoryStore {
    fn load(&self) -> RbacResult<Option<Snapshot<Permission>>> {
        Ok(self.snapshot.lock().clone())
    }

    fn commit(&self, changes: &[Change], state: &RbacState) -> RbacResult<()> {
        let snapshot = state.to_snapshot();
        *self.snapshot.lock() = Some(snapshot);
        self.journal.lock().extend_from_slice(changes);
        Ok(())
    }
}
