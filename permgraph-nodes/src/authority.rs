//! # Node Authority
//!
//! Subjects and roles holding permission-node grants. Roles form the same
//! multi-parent hierarchy as in `permgraph-rbac` (a child role inherits
//! everything its parents hold), and subjects inherit from every assigned
//! role and each of its ancestors. Subjects may also hold grants directly.
//!
//! ```text
//! subject_has_permission(S, N, payload) =
//!     holds(S, N, payload) ∨ ∃ R ∈ roles(S) ∪ ancestors(roles(S)): holds(R, N, payload)
//!
//! holds(E, N, payload) =
//!     ∃ A ∈ ancestors(N): A ∈ grants(E)
//!     ∨ (N ∈ grants(E) ∧ (payload = None ∨ payload ∈ grants(E)[N]))
//! ```
//!
//! Every mutation validates before it changes anything.

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use permgraph_rbac::{
    RbacError, RbacResult, RoleHierarchy, RoleId, RoleRecord, Snapshot, SubjectId, SubjectRecord,
};

use crate::grants::{GrantMap, PermissionNodes};
use crate::node::{NodeRegistry, PermissionNode};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SubjectEntry {
    pub(crate) grants: GrantMap,
    pub(crate) roles: BTreeSet<RoleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RoleEntry {
    pub(crate) grants: GrantMap,
    pub(crate) subjects: BTreeSet<SubjectId>,
}

/// Authority over subjects, roles and their permission-node grants.
///
/// # Example
///
/// ```
/// use permgraph_nodes::{NodeAuthority, NodeRegistry};
///
/// let registry = NodeRegistry::with_nodes(["chat.*", "chat.read", "chat.room.*", "chat.room.<x>"]).unwrap();
/// let mut authority = NodeAuthority::new(registry);
///
/// authority.create_role("member").unwrap();
/// authority.role_grant("member", "chat.read", None).unwrap();
/// authority.role_grant("member", "chat.room.<x>", Some("lobby")).unwrap();
///
/// authority.create_subject("Alice").unwrap();
/// authority.role_add_subject("member", "Alice").unwrap();
///
/// assert!(authority.subject_has_permission("Alice", "chat.room.<x>", Some("lobby")).unwrap());
/// assert!(!authority.subject_has_permission("Alice", "chat.room.<x>", Some("dev")).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAuthority {
    registry: NodeRegistry,
    hierarchy: RoleHierarchy,
    pub(crate) roles: HashMap<RoleId, RoleEntry>,
    pub(crate) subjects: HashMap<SubjectId, SubjectEntry>,
}

impl Default for NodeAuthority {
    fn default() -> Self {
        Self::new(NodeRegistry::new())
    }
}

impl NodeAuthority {
    /// Create an authority over a node registry.
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            registry,
            hierarchy: RoleHierarchy::new(),
            roles: HashMap::new(),
            subjects: HashMap::new(),
        }
    }

    /// The node registry.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Register an additional node.
    pub fn register_node(&mut self, node: &str) -> RbacResult<()> {
        self.registry.register(node).map(|_| ())
    }

    /// The role hierarchy.
    pub fn hierarchy(&self) -> &RoleHierarchy {
        &self.hierarchy
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Register a subject.
    pub fn create_subject(&mut self, subject: &str) -> RbacResult<()> {
        let subject = SubjectId::new(subject)?;
        if self.subjects.contains_key(&subject) {
            return Err(RbacError::AlreadyExists(format!(
                "Subject '{subject}' already exists!"
            )));
        }
        debug!(subject = %subject, "Created subject");
        self.subjects.insert(subject, SubjectEntry::default());
        Ok(())
    }

    /// Delete a subject, its grants and its role memberships.
    pub fn delete_subject(&mut self, subject: &str) -> RbacResult<()> {
        let entry = self
            .subjects
            .remove(subject)
            .ok_or_else(|| missing_subject(subject))?;
        for role in &entry.roles {
            if let Some(role) = self.roles.get_mut(role) {
                role.subjects.remove(subject);
            }
        }
        debug!(subject = %subject, "Deleted subject");
        Ok(())
    }

    /// Register a role.
    pub fn create_role(&mut self, role: &str) -> RbacResult<()> {
        let role = RoleId::new(role)?;
        if self.roles.contains_key(&role) {
            return Err(RbacError::AlreadyExists(format!("Role '{role}' already exists!")));
        }
        debug!(role = %role, "Created role");
        self.hierarchy.add_role(role.clone());
        self.roles.insert(role, RoleEntry::default());
        Ok(())
    }

    /// Delete a role, its grants, memberships and hierarchy edges.
    ///
    /// Parents and children of the role are not re-linked.
    pub fn delete_role(&mut self, role: &str) -> RbacResult<()> {
        let entry = self.roles.remove(role).ok_or_else(|| missing_role(role))?;
        self.hierarchy.remove_role(role)?;
        for subject in &entry.subjects {
            if let Some(subject) = self.subjects.get_mut(subject) {
                subject.roles.remove(role);
            }
        }
        debug!(role = %role, "Deleted role");
        Ok(())
    }

    /// All subjects, sorted.
    pub fn list_subjects(&self) -> BTreeSet<SubjectId> {
        self.subjects.keys().cloned().collect()
    }

    /// All roles, sorted.
    pub fn list_roles(&self) -> BTreeSet<RoleId> {
        self.roles.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Grants
    // ------------------------------------------------------------------

    /// Grant a node to a subject. Granting twice is a no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subject is unknown
    /// - `InvalidArgument` if the node is unknown or the payload does not fit it
    pub fn subject_grant(&mut self, subject: &str, node: &str, payload: Option<&str>) -> RbacResult<()> {
        let permission = self.registry.validate(node, payload)?;
        let entry = self
            .subjects
            .get_mut(subject)
            .ok_or_else(|| missing_subject(subject))?;
        if entry.grants.grant(permission, payload) {
            debug!(subject = %subject, node = %node, payload = ?payload, "Granted node");
        }
        Ok(())
    }

    /// Revoke a node (or one payload of it) from a subject. Absent grants are ignored.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subject is unknown
    /// - `InvalidArgument` if the node is unknown, a payload leaf is revoked
    ///   without a payload, or a plain node with one
    pub fn subject_revoke(&mut self, subject: &str, node: &str, payload: Option<&str>) -> RbacResult<()> {
        let permission = self.registry.validate(node, payload)?;
        let entry = self
            .subjects
            .get_mut(subject)
            .ok_or_else(|| missing_subject(subject))?;
        if entry.grants.revoke(permission, payload) {
            debug!(subject = %subject, node = %node, payload = ?payload, "Revoked node");
        }
        Ok(())
    }

    /// Grant a node to a role. Granting twice is a no-op.
    pub fn role_grant(&mut self, role: &str, node: &str, payload: Option<&str>) -> RbacResult<()> {
        let permission = self.registry.validate(node, payload)?;
        let entry = self.roles.get_mut(role).ok_or_else(|| missing_role(role))?;
        if entry.grants.grant(permission, payload) {
            debug!(role = %role, node = %node, payload = ?payload, "Granted node");
        }
        Ok(())
    }

    /// Revoke a node (or one payload of it) from a role. Absent grants are ignored.
    ///
    /// Payload arity is validated as in [`NodeAuthority::subject_revoke`].
    pub fn role_revoke(&mut self, role: &str, node: &str, payload: Option<&str>) -> RbacResult<()> {
        let permission = self.registry.validate(node, payload)?;
        let entry = self.roles.get_mut(role).ok_or_else(|| missing_role(role))?;
        if entry.grants.revoke(permission, payload) {
            debug!(role = %role, node = %node, payload = ?payload, "Revoked node");
        }
        Ok(())
    }

    /// Nodes granted directly to a subject.
    pub fn subject_permissions(&self, subject: &str) -> RbacResult<PermissionNodes> {
        self.subject_entry(subject)?.grants.to_nodes(&self.registry)
    }

    /// Nodes granted directly to a role.
    pub fn role_permissions(&self, role: &str) -> RbacResult<PermissionNodes> {
        self.role_entry(role)?.grants.to_nodes(&self.registry)
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Check whether a subject holds a node, directly or through its roles.
    pub fn subject_has_permission(&self, subject: &str, node: &str, payload: Option<&str>) -> RbacResult<bool> {
        let permission = self.registry.validate(node, payload)?;
        let entry = self.subject_entry(subject)?;
        if entry.grants.holds(&self.registry, permission, payload)? {
            return Ok(true);
        }
        for role in &entry.roles {
            if self.role_holds(role.as_str(), permission, payload)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Check whether a role holds a node, directly or through its ancestors.
    pub fn role_has_permission(&self, role: &str, node: &str, payload: Option<&str>) -> RbacResult<bool> {
        let permission = self.registry.validate(node, payload)?;
        self.role_entry(role)?;
        self.role_holds(role, permission, payload)
    }

    fn role_holds(&self, role: &str, permission: &PermissionNode, payload: Option<&str>) -> RbacResult<bool> {
        if self.role_entry(role)?.grants.holds(&self.registry, permission, payload)? {
            return Ok(true);
        }
        for ancestor in self.hierarchy.ancestors(role, true)? {
            if self
                .role_entry(ancestor.as_str())?
                .grants
                .holds(&self.registry, permission, payload)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Hierarchy and membership
    // ------------------------------------------------------------------

    /// Make `child` inherit from `parent`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if either role is unknown
    /// - `Cycle` if `parent` already inherits from `child`, or they are equal
    pub fn add_role_child(&mut self, parent: &str, child: &str) -> RbacResult<()> {
        if self.hierarchy.add_edge(parent, child)? {
            debug!(parent = %parent, child = %child, "Added role edge");
        }
        Ok(())
    }

    /// Remove exactly the edge `parent -> child`.
    pub fn remove_role_child(&mut self, parent: &str, child: &str) -> RbacResult<()> {
        if self.hierarchy.remove_edge(parent, child)? {
            debug!(parent = %parent, child = %child, "Removed role edge");
        }
        Ok(())
    }

    /// Make `subject` a member of `role`.
    pub fn role_add_subject(&mut self, role: &str, subject: &str) -> RbacResult<()> {
        let (role_id, subject_id) = self.require_membership(role, subject)?;
        if let Some(entry) = self.subjects.get_mut(subject) {
            entry.roles.insert(role_id);
        }
        if let Some(entry) = self.roles.get_mut(role) {
            if entry.subjects.insert(subject_id) {
                debug!(role = %role, subject = %subject, "Added role member");
            }
        }
        Ok(())
    }

    /// Remove `subject` from `role`. Removing a non-member is a no-op.
    pub fn role_remove_subject(&mut self, role: &str, subject: &str) -> RbacResult<()> {
        self.require_membership(role, subject)?;
        if let Some(entry) = self.subjects.get_mut(subject) {
            entry.roles.remove(role);
        }
        if let Some(entry) = self.roles.get_mut(role) {
            if entry.subjects.remove(subject) {
                debug!(role = %role, subject = %subject, "Removed role member");
            }
        }
        Ok(())
    }

    /// Direct parents of a role.
    pub fn role_parents(&self, role: &str) -> RbacResult<BTreeSet<RoleId>> {
        self.hierarchy.parents(role)
    }

    /// Direct children of a role.
    pub fn role_children(&self, role: &str) -> RbacResult<BTreeSet<RoleId>> {
        self.hierarchy.children(role)
    }

    /// Direct members of a role.
    pub fn role_subjects(&self, role: &str) -> RbacResult<BTreeSet<SubjectId>> {
        Ok(self.role_entry(role)?.subjects.clone())
    }

    /// Roles a subject is a direct member of.
    pub fn subject_roles(&self, subject: &str) -> RbacResult<BTreeSet<RoleId>> {
        Ok(self.subject_entry(subject)?.roles.clone())
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Export subjects, roles and grants as a snapshot document.
    pub fn to_snapshot(&self) -> RbacResult<Snapshot<String>> {
        let mut snapshot = Snapshot::new();
        for (role, entry) in &self.roles {
            let record = RoleRecord {
                permissions: entry.grants.serialized(&self.registry)?,
                children: self.hierarchy.children(role.as_str())?.into_iter().collect(),
                subjects: entry.subjects.iter().cloned().collect(),
            };
            snapshot.roles.insert(role.clone(), record);
        }
        for (subject, entry) in &self.subjects {
            let record = SubjectRecord {
                permissions: entry.grants.serialized(&self.registry)?,
            };
            snapshot.subjects.insert(subject.clone(), record);
        }
        Ok(snapshot)
    }

    /// Replace all subjects, roles and grants with the snapshot's content.
    ///
    /// The registry is kept. On error the authority is left unchanged.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for unknown nodes
    /// - `NotFound` for references to undefined roles or subjects
    /// - `Cycle` if the child lists form a cycle
    pub fn load_snapshot(&mut self, snapshot: &Snapshot<String>) -> RbacResult<()> {
        let mut next = NodeAuthority::new(self.registry.clone());

        for (subject, record) in &snapshot.subjects {
            next.create_subject(subject.as_str())?;
            for serialized in &record.permissions {
                let (node, payload) = next.registry.deserialize(serialized)?;
                let node = node.path().to_string();
                next.subject_grant(subject.as_str(), &node, payload.as_deref())?;
            }
        }
        for role in snapshot.roles.keys() {
            next.create_role(role.as_str())?;
        }
        for (role, record) in &snapshot.roles {
            for serialized in &record.permissions {
                let (node, payload) = next.registry.deserialize(serialized)?;
                let node = node.path().to_string();
                next.role_grant(role.as_str(), &node, payload.as_deref())?;
            }
            for child in &record.children {
                next.add_role_child(role.as_str(), child.as_str())?;
            }
            for subject in &record.subjects {
                next.role_add_subject(role.as_str(), subject.as_str())?;
            }
        }

        tracing::info!(
            roles = next.roles.len(),
            subjects = next.subjects.len(),
            "Loaded node authority snapshot"
        );
        *self = next;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Private
    // ------------------------------------------------------------------

    pub(crate) fn subject_entry(&self, subject: &str) -> RbacResult<&SubjectEntry> {
        self.subjects
            .get(subject)
            .ok_or_else(|| missing_subject(subject))
    }

    pub(crate) fn role_entry(&self, role: &str) -> RbacResult<&RoleEntry> {
        self.roles.get(role).ok_or_else(|| missing_role(role))
    }

    fn require_membership(&self, role: &str, subject: &str) -> RbacResult<(RoleId, SubjectId)> {
        let role_id = RoleId::new(role)?;
        let subject_id = SubjectId::new(subject)?;
        self.role_entry(role)?;
        self.subject_entry(subject)?;
        Ok((role_id, subject_id))
    }
}

fn missing_subject(subject: &str) -> RbacError {
    if subject.is_empty() {
        RbacError::empty_subject()
    } else {
        RbacError::unknown_subject(subject)
    }
}

fn missing_role(role: &str) -> RbacError {
    if role.is_empty() {
        RbacError::empty_role()
    } else {
        RbacError::unknown_role(role)
    }
}
