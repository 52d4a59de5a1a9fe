//! Administrative and query service
//!
//! [`Rbac`] is the entry point callers use. It owns the state behind a
//! `parking_lot::RwLock` and a [`StorageProvider`] for durability.
//!
//! Queries take the read lock and resolve against a consistent state.
//! Mutations take the write lock, apply the change to a copy of the state,
//! commit the resulting change list to the provider and only then publish
//! the copy. Readers never observe a half-applied mutation, and a failed
//! mutation or commit leaves the published state untouched.
//!
//! Every mutation clones the whole state under the write lock, so a write
//! costs time proportional to the number of roles, subjects and policies.
//! Reads never copy.

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dag::RoleDag;
use crate::directory::RbacState;
use crate::engine::Resolver;
use crate::error::{RbacError, RbacResult};
use crate::ids::{RoleId, SubjectId};
use crate::permissions::{Permission, PermissionSet, Policy};
use crate::provider::{Change, MemoryStore, StorageProvider};
use crate::snapshot::Snapshot;

/// Role-based access control service.
///
/// # Example
///
/// ```
/// use permgraph_rbac::{Permission, Rbac};
///
/// let rbac = Rbac::new();
/// rbac.create_role("user").unwrap();
/// rbac.create_role("admin").unwrap();
/// rbac.add_hierarchy("user", "admin").unwrap();
/// rbac.grant_permission("user", &Permission::global("event", "view").unwrap()).unwrap();
///
/// rbac.create_subject("Alex").unwrap();
/// rbac.assign_role("Alex", "admin").unwrap();
///
/// let view = Permission::new("event", "5", "view").unwrap();
/// assert!(rbac.check_permission("Alex", &view).unwrap());
/// ```
pub struct Rbac {
    state: RwLock<RbacState>,
    provider: Arc<dyn StorageProvider>,
}

impl fmt::Debug for Rbac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Rbac")
            .field("roles", &state.roles().len())
            .field("subjects", &state.subjects().len())
            .finish()
    }
}

impl Default for Rbac {
    fn default() -> Self {
        Self::new()
    }
}

impl Rbac {
    /// Create an empty service backed by a fresh [`MemoryStore`].
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RbacState::new()),
            provider: Arc::new(MemoryStore::new()),
        }
    }

    /// Create a service backed by `provider`, loading whatever it has stored.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports while loading, or a validation error if
    /// the stored records are inconsistent.
    pub fn with_provider(provider: Arc<dyn StorageProvider>) -> RbacResult<Self> {
        let state = match provider.load()? {
            Some(snapshot) => {
                let state = RbacState::from_snapshot(&snapshot)?;
                info!(
                    roles = state.roles().len(),
                    subjects = state.subjects().len(),
                    "Loaded access control state"
                );
                state
            }
            None => RbacState::new(),
        };
        Ok(Self {
            state: RwLock::new(state),
            provider,
        })
    }

    /// The storage provider.
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// A copy of the current state.
    pub fn state(&self) -> RbacState {
        self.state.read().clone()
    }

    /// Export the current state as a snapshot document.
    pub fn snapshot(&self) -> Snapshot<Permission> {
        self.state.read().to_snapshot()
    }

    /// Apply a mutation and commit it.
    ///
    /// # Returns
    ///
    /// `false` if the mutation was a no-op and nothing was committed
    fn mutate<F>(&self, operation: &'static str, apply: F) -> RbacResult<bool>
    where
        F: FnOnce(&mut RbacState) -> RbacResult<Vec<Change>>,
    {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let changes = apply(&mut next)?;
        if changes.is_empty() {
            debug!(operation, "No changes to commit");
            return Ok(false);
        }
        if let Err(e) = self.provider.commit(&changes, &next) {
            error!(operation, error = %e, "Storage commit failed");
            return Err(e);
        }
        *guard = next;
        Ok(true)
    }

    fn read<T, F>(&self, query: F) -> RbacResult<T>
    where
        F: FnOnce(Resolver<'_>) -> RbacResult<T>,
    {
        let guard = self.state.read();
        query(guard.resolver())
    }

    // ------------------------------------------------------------------
    // Subjects and roles
    // ------------------------------------------------------------------

    /// Register a subject.
    pub fn create_subject(&self, subject: &str) -> RbacResult<()> {
        if self.mutate("create_subject", |s| s.create_subject(subject))? {
            debug!(subject = %subject, "Created subject");
        }
        Ok(())
    }

    /// Delete a subject and its role assignments.
    pub fn delete_subject(&self, subject: &str) -> RbacResult<()> {
        if self.mutate("delete_subject", |s| s.delete_subject(subject))? {
            debug!(subject = %subject, "Deleted subject");
        }
        Ok(())
    }

    /// Register a role.
    pub fn create_role(&self, role: &str) -> RbacResult<()> {
        if self.mutate("create_role", |s| s.create_role(role))? {
            debug!(role = %role, "Created role");
        }
        Ok(())
    }

    /// Delete a role with its policies, assignments and hierarchy edges.
    pub fn delete_role(&self, role: &str) -> RbacResult<()> {
        if self.mutate("delete_role", |s| s.delete_role(role))? {
            debug!(role = %role, "Deleted role");
        }
        Ok(())
    }

    /// All registered subjects.
    pub fn list_subjects(&self) -> BTreeSet<SubjectId> {
        self.state.read().subjects().subjects()
    }

    /// All registered roles.
    pub fn list_roles(&self) -> BTreeSet<RoleId> {
        self.state.read().roles().roles()
    }

    // ------------------------------------------------------------------
    // Assignments, grants and hierarchy
    // ------------------------------------------------------------------

    /// Assign `role` to `subject`.
    pub fn assign_role(&self, subject: &str, role: &str) -> RbacResult<()> {
        if self.mutate("assign_role", |s| s.assign_role(subject, role))? {
            debug!(subject = %subject, role = %role, "Assigned role");
        }
        Ok(())
    }

    /// Remove the assignment of `role` to `subject`.
    pub fn deassign_role(&self, subject: &str, role: &str) -> RbacResult<()> {
        if self.mutate("deassign_role", |s| s.deassign_role(subject, role))? {
            debug!(subject = %subject, role = %role, "Deassigned role");
        }
        Ok(())
    }

    /// Grant `permission` to `role`.
    pub fn grant_permission(&self, role: &str, permission: &Permission) -> RbacResult<()> {
        if self.mutate("grant_permission", |s| {
            s.grant_permission(role, permission.clone())
        })? {
            debug!(role = %role, permission = %permission, "Granted permission");
        }
        Ok(())
    }

    /// Revoke `permission` from `role`.
    pub fn revoke_permission(&self, role: &str, permission: &Permission) -> RbacResult<()> {
        if self.mutate("revoke_permission", |s| s.revoke_permission(role, permission))? {
            debug!(role = %role, permission = %permission, "Revoked permission");
        }
        Ok(())
    }

    /// Make `child` inherit from `parent`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if either role is unknown
    /// - `Cycle` if `parent` already inherits from `child`, or they are equal
    pub fn add_hierarchy(&self, parent: &str, child: &str) -> RbacResult<()> {
        if self.mutate("add_hierarchy", |s| s.add_hierarchy(parent, child))? {
            debug!(parent = %parent, child = %child, "Added hierarchy edge");
        }
        Ok(())
    }

    /// Remove exactly the edge `parent -> child`.
    pub fn remove_hierarchy(&self, parent: &str, child: &str) -> RbacResult<()> {
        if self.mutate("remove_hierarchy", |s| s.remove_hierarchy(parent, child))? {
            debug!(parent = %parent, child = %child, "Removed hierarchy edge");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Role queries
    // ------------------------------------------------------------------

    /// Direct parents of `role`.
    pub fn role_parents(&self, role: &str) -> RbacResult<BTreeSet<RoleId>> {
        self.state.read().roles().hierarchy().ancestors(role, false)
    }

    /// Direct children of `role`.
    pub fn role_children(&self, role: &str) -> RbacResult<BTreeSet<RoleId>> {
        self.state.read().roles().hierarchy().descendants(role, false)
    }

    /// Every role `role` inherits from.
    pub fn role_ancestors(&self, role: &str) -> RbacResult<BTreeSet<RoleId>> {
        self.state.read().roles().hierarchy().ancestors(role, true)
    }

    /// Every role inheriting from `role`.
    pub fn role_descendants(&self, role: &str) -> RbacResult<BTreeSet<RoleId>> {
        self.state.read().roles().hierarchy().descendants(role, true)
    }

    /// Subjects assigned to `role`, optionally including those of its descendants.
    pub fn role_subjects(&self, role: &str, include_descendants: bool) -> RbacResult<BTreeSet<SubjectId>> {
        self.read(|r| r.role_subjects(role, include_descendants))
    }

    /// Permissions of `role`, optionally including inherited ones.
    pub fn role_permissions(&self, role: &str, inherited: bool) -> RbacResult<PermissionSet> {
        self.read(|r| r.role_permissions(role, inherited))
    }

    /// Policies of `role`, optionally including inherited ones.
    pub fn role_policies(&self, role: &str, inherited: bool) -> RbacResult<BTreeSet<Policy>> {
        self.read(|r| r.role_policies(role, inherited))
    }

    /// Check whether `role` holds a permission matching `requested`.
    pub fn check_role_permission(&self, role: &str, requested: &Permission) -> RbacResult<bool> {
        self.read(|r| r.check_role_permission(role, requested))
    }

    /// Fail with `PermissionDenied` unless `role` holds `requested`.
    pub fn assert_role_permission(&self, role: &str, requested: &Permission) -> RbacResult<()> {
        self.read(|r| r.assert_role_permission(role, requested))
            .inspect_err(log_denial)
    }

    /// Actions `role` may perform on a resource.
    pub fn role_actions_on_resource(
        &self,
        role: &str,
        resource_type: &str,
        resource_id: &str,
        inherited: bool,
    ) -> RbacResult<BTreeSet<String>> {
        self.read(|r| r.role_actions_on_resource(role, resource_type, resource_id, inherited))
    }

    // ------------------------------------------------------------------
    // Subject queries
    // ------------------------------------------------------------------

    /// Roles of `subject`, optionally including every ancestor role.
    pub fn subject_roles(&self, subject: &str, ascendant: bool) -> RbacResult<BTreeSet<RoleId>> {
        self.read(|r| r.subject_roles(subject, ascendant))
    }

    /// Effective permissions of `subject`.
    pub fn subject_permissions(&self, subject: &str) -> RbacResult<PermissionSet> {
        self.read(|r| r.subject_permissions(subject))
    }

    /// Effective policies of `subject`.
    pub fn subject_policies(&self, subject: &str) -> RbacResult<BTreeSet<Policy>> {
        self.read(|r| r.subject_policies(subject))
    }

    /// Check whether `subject` holds a permission matching `requested`.
    ///
    /// Returns `Ok(false)` for a missing grant; fails only for an unknown subject.
    pub fn check_permission(&self, subject: &str, requested: &Permission) -> RbacResult<bool> {
        self.read(|r| r.check_permission(subject, requested))
    }

    /// Fail with `PermissionDenied` unless `subject` holds `requested`.
    ///
    /// # Example
    ///
    /// ```
    /// use permgraph_rbac::{ErrorKind, Permission, Rbac};
    ///
    /// let rbac = Rbac::new();
    /// rbac.create_subject("Ursula").unwrap();
    ///
    /// let edit = Permission::new("event", "5", "edit").unwrap();
    /// let err = rbac.assert_permission("Ursula", &edit).unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Permission 'event[5]:edit' is not granted for Subject 'Ursula'!"
    /// );
    /// ```
    pub fn assert_permission(&self, subject: &str, requested: &Permission) -> RbacResult<()> {
        self.read(|r| r.assert_permission(subject, requested))
            .inspect_err(log_denial)
    }

    /// Actions `subject` may perform on a resource.
    pub fn subject_actions_on_resource(
        &self,
        subject: &str,
        resource_type: &str,
        resource_id: &str,
        inherited: bool,
    ) -> RbacResult<BTreeSet<String>> {
        self.read(|r| r.subject_actions_on_resource(subject, resource_type, resource_id, inherited))
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Export the hierarchy seen from `root_roles` (every role when `None`).
    pub fn role_dag(
        &self,
        root_roles: Option<&[&str]>,
        include_subjects: bool,
        include_permissions: bool,
    ) -> RbacResult<RoleDag> {
        self.state
            .read()
            .role_dag(root_roles, include_subjects, include_permissions)
    }
}

fn log_denial(error: &RbacError) {
    if let RbacError::PermissionDenied(message) = error {
        warn!(reason = %message, "Permission denied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    impl StorageProvider for FailingStore {
        fn load(&self) -> RbacResult<Option<Snapshot<Permission>>> {
            Ok(None)
        }

        fn commit(&self, _changes: &[Change], _state: &RbacState) -> RbacResult<()> {
            Err(RbacError::Storage("read-only".into()))
        }
    }

    #[test]
    fn test_failed_commit_leaves_state_untouched() {
        let rbac = Rbac::with_provider(Arc::new(FailingStore)).unwrap();
        let err = rbac.create_role("user").unwrap_err();
        assert_eq!(err, RbacError::Storage("read-only".into()));
        assert!(err.is_server_error());
        assert!(rbac.list_roles().is_empty());
    }

    #[test]
    fn test_noop_does_not_commit() {
        let store = Arc::new(MemoryStore::new());
        let rbac = Rbac::with_provider(store.clone()).unwrap();
        rbac.create_role("user").unwrap();
        let perm = Permission::global("event", "view").unwrap();
        rbac.grant_permission("user", &perm).unwrap();
        rbac.grant_permission("user", &perm).unwrap();
        rbac.revoke_permission("user", &Permission::global("event", "edit").unwrap())
            .unwrap();

        assert_eq!(store.journal().len(), 2);
    }

    #[test]
    fn test_reload_from_provider() {
        let store = Arc::new(MemoryStore::new());
        {
            let rbac = Rbac::with_provider(store.clone()).unwrap();
            rbac.create_role("user").unwrap();
            rbac.create_subject("Alex").unwrap();
            rbac.assign_role("Alex", "user").unwrap();
        }
        let rbac = Rbac::with_provider(store).unwrap();
        assert!(rbac.subject_roles("Alex", false).unwrap().contains("user"));
    }

    #[test]
    fn test_role_queries() {
        let rbac = Rbac::new();
        for role in ["a", "b", "c"] {
            rbac.create_role(role).unwrap();
        }
        rbac.add_hierarchy("a", "b").unwrap();
        rbac.add_hierarchy("b", "c").unwrap();

        assert_eq!(rbac.role_parents("c").unwrap().len(), 1);
        assert_eq!(rbac.role_ancestors("c").unwrap().len(), 2);
        assert_eq!(rbac.role_children("a").unwrap().len(), 1);
        assert_eq!(rbac.role_descendants("a").unwrap().len(), 2);
        assert!(matches!(rbac.role_parents("z"), Err(RbacError::NotFound(_))));
    }

    #[test]
    fn test_debug_output() {
        let rbac = Rbac::new();
        rbac.create_role("user").unwrap();
        assert_eq!(format!("{rbac:?}"), "Rbac { roles: 1, subjects: 0 }");
    }

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_mutations_log_entity_ids() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let rbac = Rbac::new();
            rbac.create_role("admin").unwrap();
            rbac.create_subject("Alex").unwrap();
            rbac.assign_role("Alex", "admin").unwrap();
            rbac.assign_role("Alex", "admin").unwrap();
        });

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("Created role role=admin"));
        assert!(output.contains("Created subject subject=Alex"));
        assert_eq!(output.matches("Assigned role").count(), 1);
        assert!(output.contains("No changes to commit"));
    }
}
