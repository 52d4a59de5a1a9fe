//! # Role and Subject Directories
//!
//! [`RoleDirectory`] stores roles, their direct grants, their member subjects
//! and the hierarchy edges between them. [`SubjectDirectory`] stores subjects
//! and their direct role assignments. [`RbacState`] pairs the two and is the
//! unit the service locks, copies, commits and publishes.
//!
//! Every mutation on [`RbacState`] validates before it touches anything, so a
//! failed call leaves the state unchanged. A successful call returns the
//! record-level [`Change`]s it applied; an idempotent no-op returns none.

use std::collections::{BTreeSet, HashMap};

use crate::error::{RbacError, RbacResult};
use crate::hierarchy::RoleHierarchy;
use crate::ids::{RoleId, SubjectId};
use crate::permissions::{Permission, PermissionSet, Policy};
use crate::provider::Change;
use crate::snapshot::{RoleRecord, Snapshot, SubjectRecord};

/// Roles, direct grants, memberships and hierarchy edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDirectory {
    hierarchy: RoleHierarchy,
    policies: HashMap<RoleId, PermissionSet>,
    members: HashMap<RoleId, BTreeSet<SubjectId>>,
}

impl RoleDirectory {
    /// Check if a role is registered.
    pub fn contains(&self, role: &str) -> bool {
        self.hierarchy.contains(role)
    }

    /// All roles, sorted.
    pub fn roles(&self) -> BTreeSet<RoleId> {
        self.hierarchy.roles().cloned().collect()
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.hierarchy.len()
    }

    /// Check if no role is registered.
    pub fn is_empty(&self) -> bool {
        self.hierarchy.is_empty()
    }

    /// The hierarchy graph.
    pub fn hierarchy(&self) -> &RoleHierarchy {
        &self.hierarchy
    }

    /// Permissions granted directly to `role`.
    pub fn direct_permissions(&self, role: &str) -> RbacResult<&PermissionSet> {
        self.policies
            .get(role)
            .ok_or_else(|| RbacError::unknown_role(role))
    }

    /// Subjects assigned directly to `role`.
    pub fn members(&self, role: &str) -> RbacResult<&BTreeSet<SubjectId>> {
        self.members
            .get(role)
            .ok_or_else(|| RbacError::unknown_role(role))
    }

    /// Fail with `NotFound` unless the role is registered.
    pub fn require(&self, role: &str) -> RbacResult<()> {
        if role.is_empty() {
            return Err(RbacError::empty_role());
        }
        if !self.contains(role) {
            return Err(RbacError::unknown_role(role));
        }
        Ok(())
    }

    fn insert(&mut self, role: RoleId) {
        self.policies.insert(role.clone(), PermissionSet::new());
        self.members.insert(role.clone(), BTreeSet::new());
        self.hierarchy.add_role(role);
    }
}

/// Subjects and their direct role assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectDirectory {
    assignments: HashMap<SubjectId, BTreeSet<RoleId>>,
}

impl SubjectDirectory {
    /// Check if a subject is registered.
    pub fn contains(&self, subject: &str) -> bool {
        self.assignments.contains_key(subject)
    }

    /// All subjects, sorted.
    pub fn subjects(&self) -> BTreeSet<SubjectId> {
        self.assignments.keys().cloned().collect()
    }

    /// Number of subjects.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Check if no subject is registered.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Roles assigned directly to `subject`.
    pub fn roles(&self, subject: &str) -> RbacResult<&BTreeSet<RoleId>> {
        self.assignments
            .get(subject)
            .ok_or_else(|| RbacError::unknown_subject(subject))
    }

    /// Fail with `NotFound` unless the subject is registered.
    pub fn require(&self, subject: &str) -> RbacResult<()> {
        if subject.is_empty() {
            return Err(RbacError::empty_subject());
        }
        if !self.contains(subject) {
            return Err(RbacError::unknown_subject(subject));
        }
        Ok(())
    }
}

/// The complete in-memory access control state.
///
/// # Example
///
/// ```
/// use permgraph_rbac::{Permission, RbacState};
///
/// let mut state = RbacState::default();
/// state.create_role("user").unwrap();
/// state.create_subject("Ursula").unwrap();
/// state.assign_role("Ursula", "user").unwrap();
///
/// let changes = state
///     .grant_permission("user", Permission::global("event", "view").unwrap())
///     .unwrap();
/// assert_eq!(changes.len(), 1);
///
/// // Granting again changes nothing
/// let changes = state
///     .grant_permission("user", Permission::global("event", "view").unwrap())
///     .unwrap();
/// assert!(changes.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RbacState {
    roles: RoleDirectory,
    subjects: SubjectDirectory,
}

impl RbacState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The role directory.
    pub fn roles(&self) -> &RoleDirectory {
        &self.roles
    }

    /// The subject directory.
    pub fn subjects(&self) -> &SubjectDirectory {
        &self.subjects
    }

    /// Register a new subject.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `subject` is empty
    /// - `AlreadyExists` if the subject is registered
    pub fn create_subject(&mut self, subject: &str) -> RbacResult<Vec<Change>> {
        let subject = SubjectId::new(subject)?;
        if self.subjects.contains(subject.as_str()) {
            return Err(RbacError::AlreadyExists(format!(
                "Subject '{subject}' already exists!"
            )));
        }
        self.subjects
            .assignments
            .insert(subject.clone(), BTreeSet::new());
        Ok(vec![Change::CreateSubject { subject }])
    }

    /// Delete a subject and all of its role assignments.
    pub fn delete_subject(&mut self, subject: &str) -> RbacResult<Vec<Change>> {
        self.subjects.require(subject)?;
        let (subject, roles) = self
            .subjects
            .assignments
            .remove_entry(subject)
            .ok_or_else(|| RbacError::unknown_subject(subject))?;

        let mut changes = Vec::with_capacity(roles.len() + 1);
        for role in roles {
            if let Some(members) = self.roles.members.get_mut(&role) {
                members.remove(&subject);
            }
            changes.push(Change::DeassignRole {
                subject: subject.clone(),
                role,
            });
        }
        changes.push(Change::DeleteSubject { subject });
        Ok(changes)
    }

    /// Register a new role.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `role` is empty
    /// - `AlreadyExists` if the role is registered
    pub fn create_role(&mut self, role: &str) -> RbacResult<Vec<Change>> {
        let role = RoleId::new(role)?;
        if self.roles.contains(role.as_str()) {
            return Err(RbacError::AlreadyExists(format!(
                "Role '{role}' already exists!"
            )));
        }
        self.roles.insert(role.clone());
        Ok(vec![Change::CreateRole { role }])
    }

    /// Delete a role with its policies, assignments and incident edges.
    ///
    /// Parents and children of the role are not re-linked.
    pub fn delete_role(&mut self, role: &str) -> RbacResult<Vec<Change>> {
        self.roles.require(role)?;
        let (role, permissions) = self
            .roles
            .policies
            .remove_entry(role)
            .ok_or_else(|| RbacError::unknown_role(role))?;
        let members = self.roles.members.remove(&role).unwrap_or_default();
        let edges = self.roles.hierarchy.remove_role(role.as_str())?;

        let mut changes = Vec::with_capacity(permissions.len() + members.len() + edges.len() + 1);
        for permission in permissions {
            changes.push(Change::Revoke {
                policy: Policy::new(role.clone(), permission),
            });
        }
        for subject in members {
            if let Some(assigned) = self.subjects.assignments.get_mut(&subject) {
                assigned.remove(&role);
            }
            changes.push(Change::DeassignRole {
                subject,
                role: role.clone(),
            });
        }
        for (parent, child) in edges {
            changes.push(Change::RemoveEdge { parent, child });
        }
        changes.push(Change::DeleteRole { role });
        Ok(changes)
    }

    /// Assign a role to a subject. Assigning twice is a no-op.
    pub fn assign_role(&mut self, subject: &str, role: &str) -> RbacResult<Vec<Change>> {
        let (subject, role) = self.require_assignment(subject, role)?;
        let inserted = self
            .subjects
            .assignments
            .get_mut(&subject)
            .map(|roles| roles.insert(role.clone()))
            .unwrap_or(false);
        if !inserted {
            return Ok(Vec::new());
        }
        if let Some(members) = self.roles.members.get_mut(&role) {
            members.insert(subject.clone());
        }
        Ok(vec![Change::AssignRole { subject, role }])
    }

    /// Remove a role assignment. Removing an absent assignment is a no-op.
    pub fn deassign_role(&mut self, subject: &str, role: &str) -> RbacResult<Vec<Change>> {
        let (subject, role) = self.require_assignment(subject, role)?;
        let removed = self
            .subjects
            .assignments
            .get_mut(&subject)
            .map(|roles| roles.remove(&role))
            .unwrap_or(false);
        if !removed {
            return Ok(Vec::new());
        }
        if let Some(members) = self.roles.members.get_mut(&role) {
            members.remove(&subject);
        }
        Ok(vec![Change::DeassignRole { subject, role }])
    }

    /// Grant a permission to a role. Granting twice is a no-op.
    pub fn grant_permission(&mut self, role: &str, permission: Permission) -> RbacResult<Vec<Change>> {
        self.roles.require(role)?;
        let role = RoleId::new(role)?;
        let added = self
            .roles
            .policies
            .get_mut(&role)
            .map(|set| set.add(permission.clone()))
            .unwrap_or(false);
        if !added {
            return Ok(Vec::new());
        }
        Ok(vec![Change::Grant {
            policy: Policy::new(role, permission),
        }])
    }

    /// Revoke a permission from a role. Revoking an absent grant is a no-op.
    pub fn revoke_permission(&mut self, role: &str, permission: &Permission) -> RbacResult<Vec<Change>> {
        self.roles.require(role)?;
        let role = RoleId::new(role)?;
        let removed = self
            .roles
            .policies
            .get_mut(&role)
            .map(|set| set.remove(permission))
            .unwrap_or(false);
        if !removed {
            return Ok(Vec::new());
        }
        Ok(vec![Change::Revoke {
            policy: Policy::new(role, permission.clone()),
        }])
    }

    /// Add the hierarchy edge `parent -> child`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if either role is unknown
    /// - `Cycle` if the edge would close a cycle (including `parent == child`)
    pub fn add_hierarchy(&mut self, parent: &str, child: &str) -> RbacResult<Vec<Change>> {
        let (parent_id, child_id) = require_role_pair(parent, child)?;
        if !self.roles.hierarchy.add_edge(parent, child)? {
            return Ok(Vec::new());
        }
        Ok(vec![Change::AddEdge {
            parent: parent_id,
            child: child_id,
        }])
    }

    /// Remove exactly the hierarchy edge `parent -> child`.
    pub fn remove_hierarchy(&mut self, parent: &str, child: &str) -> RbacResult<Vec<Change>> {
        let (parent_id, child_id) = require_role_pair(parent, child)?;
        if !self.roles.hierarchy.remove_edge(parent, child)? {
            return Ok(Vec::new());
        }
        Ok(vec![Change::RemoveEdge {
            parent: parent_id,
            child: child_id,
        }])
    }

    /// Export the state as a snapshot document.
    pub fn to_snapshot(&self) -> Snapshot<Permission> {
        let mut snapshot = Snapshot::new();
        for role in self.roles.hierarchy.roles() {
            let record = RoleRecord {
                permissions: self
                    .roles
                    .policies
                    .get(role)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default(),
                children: self
                    .roles
                    .hierarchy
                    .children(role.as_str())
                    .map(|children| children.into_iter().collect())
                    .unwrap_or_default(),
                subjects: self
                    .roles
                    .members
                    .get(role)
                    .map(|members| members.iter().cloned().collect())
                    .unwrap_or_default(),
            };
            snapshot.roles.insert(role.clone(), record);
        }
        for subject in self.subjects.assignments.keys() {
            snapshot
                .subjects
                .insert(subject.clone(), SubjectRecord::default());
        }
        snapshot
    }

    /// Build a state from a snapshot document.
    ///
    /// # Errors
    ///
    /// - `NotFound` if a role references an undefined child role or subject
    /// - `Cycle` if the child lists form a cycle
    /// - `InvalidArgument` if a subject carries direct permissions, which this
    ///   model does not support
    pub fn from_snapshot(snapshot: &Snapshot<Permission>) -> RbacResult<Self> {
        let mut state = Self::new();

        for (subject, record) in &snapshot.subjects {
            if !record.permissions.is_empty() {
                return Err(RbacError::InvalidArgument(format!(
                    "Subject '{subject}' cannot hold direct permissions!"
                )));
            }
            state.subjects.assignments.insert(subject.clone(), BTreeSet::new());
        }
        for role in snapshot.roles.keys() {
            state.roles.insert(role.clone());
        }

        for (role, record) in &snapshot.roles {
            for permission in &record.permissions {
                state.grant_permission(role.as_str(), permission.clone())?;
            }
            for child in &record.children {
                state.add_hierarchy(role.as_str(), child.as_str())?;
            }
            for subject in &record.subjects {
                state.assign_role(subject.as_str(), role.as_str())?;
            }
        }
        Ok(state)
    }

    fn require_assignment(&self, subject: &str, role: &str) -> RbacResult<(SubjectId, RoleId)> {
        let subject_id = SubjectId::new(subject)?;
        let role_id = RoleId::new(role)?;
        self.subjects.require(subject)?;
        self.roles.require(role)?;
        Ok((subject_id, role_id))
    }
}

fn require_role_pair(parent: &str, child: &str) -> RbacResult<(RoleId, RoleId)> {
    Ok((RoleId::new(parent)?, RoleId::new(child)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(t: &str, id: &str, a: &str) -> Permission {
        Permission::new(t, id, a).unwrap()
    }

    fn populated() -> RbacState {
        let mut state = RbacState::new();
        for role in ["user", "editor", "admin"] {
            state.create_role(role).unwrap();
        }
        for subject in ["Alex", "Ursula"] {
            state.create_subject(subject).unwrap();
        }
        state.add_hierarchy("user", "editor").unwrap();
        state.add_hierarchy("editor", "admin").unwrap();
        state.grant_permission("user", perm("event", "*", "view")).unwrap();
        state.grant_permission("editor", perm("event", "*", "edit")).unwrap();
        state.assign_role("Alex", "editor").unwrap();
        state.assign_role("Ursula", "user").unwrap();
        state
    }

    #[test]
    fn test_create_duplicates_and_empty() {
        let mut state = RbacState::new();
        state.create_role("user").unwrap();
        assert_eq!(
            state.create_role("user").unwrap_err(),
            RbacError::AlreadyExists("Role 'user' already exists!".into())
        );
        assert_eq!(
            state.create_role("").unwrap_err(),
            RbacError::InvalidArgument("Role name cannot be empty!".into())
        );

        state.create_subject("Alex").unwrap();
        assert_eq!(
            state.create_subject("Alex").unwrap_err(),
            RbacError::AlreadyExists("Subject 'Alex' already exists!".into())
        );
        assert!(matches!(
            state.create_subject(""),
            Err(RbacError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let mut state = populated();
        assert!(state.assign_role("Alex", "editor").unwrap().is_empty());
        assert!(state.deassign_role("Alex", "admin").unwrap().is_empty());
        assert_eq!(state.deassign_role("Alex", "editor").unwrap().len(), 1);
        assert!(state.subjects().roles("Alex").unwrap().is_empty());
        assert!(state.roles().members("editor").unwrap().is_empty());
    }

    #[test]
    fn test_assignment_unknown_entities() {
        let mut state = populated();
        assert_eq!(
            state.assign_role("Bob", "user").unwrap_err(),
            RbacError::NotFound("Subject 'Bob' does not exist!".into())
        );
        assert_eq!(
            state.assign_role("Alex", "guest").unwrap_err(),
            RbacError::NotFound("Role 'guest' does not exist!".into())
        );
    }

    #[test]
    fn test_revoke_absent_grant_is_noop() {
        let mut state = populated();
        let before = state.clone();
        assert!(state
            .revoke_permission("user", &perm("event", "*", "delete"))
            .unwrap()
            .is_empty());
        assert_eq!(state, before);
        assert!(matches!(
            state.revoke_permission("guest", &perm("event", "*", "view")),
            Err(RbacError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_role_cascade_records() {
        let mut state = populated();
        let changes = state.delete_role("editor").unwrap();

        assert_eq!(
            changes,
            vec![
                Change::Revoke {
                    policy: Policy::new(RoleId::new("editor").unwrap(), perm("event", "*", "edit")),
                },
                Change::DeassignRole {
                    subject: SubjectId::new("Alex").unwrap(),
                    role: RoleId::new("editor").unwrap(),
                },
                Change::RemoveEdge {
                    parent: RoleId::new("user").unwrap(),
                    child: RoleId::new("editor").unwrap(),
                },
                Change::RemoveEdge {
                    parent: RoleId::new("editor").unwrap(),
                    child: RoleId::new("admin").unwrap(),
                },
                Change::DeleteRole {
                    role: RoleId::new("editor").unwrap(),
                },
            ]
        );

        assert!(!state.roles().contains("editor"));
        assert!(state.subjects().roles("Alex").unwrap().is_empty());
        // no re-linking
        assert!(!state.roles().hierarchy().has_edge("user", "admin"));
    }

    #[test]
    fn test_delete_subject_removes_assignments() {
        let mut state = populated();
        let changes = state.delete_subject("Ursula").unwrap();
        assert_eq!(changes.len(), 2);
        assert!(!state.subjects().contains("Ursula"));
        assert!(state.roles().members("user").unwrap().is_empty());
        assert!(matches!(
            state.delete_subject("Ursula"),
            Err(RbacError::NotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let state = populated();
        let snapshot = state.to_snapshot();
        assert_eq!(snapshot.edge_count(), 2);
        assert_eq!(snapshot.grant_count(), 2);

        let restored = RbacState::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_snapshot_validation() {
        let mut snapshot = populated().to_snapshot();
        snapshot
            .roles
            .get_mut("admin")
            .unwrap()
            .children
            .push(RoleId::new("user").unwrap());
        assert!(matches!(
            RbacState::from_snapshot(&snapshot),
            Err(RbacError::Cycle(_))
        ));

        let mut snapshot = populated().to_snapshot();
        snapshot
            .roles
            .get_mut("user")
            .unwrap()
            .subjects
            .push(SubjectId::new("Ghost").unwrap());
        assert_eq!(
            RbacState::from_snapshot(&snapshot).unwrap_err(),
            RbacError::NotFound("Subject 'Ghost' does not exist!".into())
        );

        let mut snapshot = populated().to_snapshot();
        snapshot
            .subjects
            .get_mut("Alex")
            .unwrap()
            .permissions
            .push(perm("event", "*", "view"));
        assert!(matches!(
            RbacState::from_snapshot(&snapshot),
            Err(RbacError::InvalidArgument(_))
        ));
    }
}
