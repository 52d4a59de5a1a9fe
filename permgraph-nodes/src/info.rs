//! Info views over subjects and roles
//!
//! [`NodeAuthority::subject_info`] and [`NodeAuthority::role_info`] collect
//! everything that shapes an entity's effective permissions: its direct
//! grants, every role it inherits from, and the permission sub-tree under
//! each granted node.
//!
//! ```text
//! {
//!   "roles":   { "member": { "permission_nodes": {...}, "parents": ["guest"] }, ... },
//!   "subject": { "entity_id": "Alice", "permission_nodes": {...}, "roles": ["member"] },
//!   "permission_tree": { "chat.*": { "chat.read": null, "chat.room.*": { "chat.room.<x>": [] } } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use permgraph_rbac::{RbacResult, RoleId};

use crate::authority::NodeAuthority;
use crate::grants::{GrantMap, PermissionNodes};
use crate::node::{NodeRegistry, PermissionNode};

/// One level of a [`PermissionTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeBranch {
    /// A non-leaf node with its registered children
    Children(BTreeMap<String, TreeBranch>),
    /// A payload leaf with the payloads in effect
    Payloads(BTreeSet<String>),
    /// A plain leaf
    Leaf,
}

/// Granted nodes expanded into their sub-trees.
pub type PermissionTree = BTreeMap<String, TreeBranch>;

/// A role as seen from an info view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleView {
    /// Nodes granted directly to the role
    pub permission_nodes: PermissionNodes,
    /// Direct parents of the role
    pub parents: Vec<RoleId>,
}

/// The entity an info view is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    /// Subject or role id
    pub entity_id: String,
    /// Nodes granted directly to the entity
    pub permission_nodes: PermissionNodes,
    /// Direct roles of a subject, direct parents of a role
    pub roles: Vec<RoleId>,
}

/// Everything that contributes to a subject's permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectInfo {
    /// Assigned roles and all of their ancestors
    pub roles: BTreeMap<RoleId, RoleView>,
    /// The subject itself
    pub subject: EntityView,
    /// Nodes in effect for the subject, expanded
    pub permission_tree: PermissionTree,
}

/// Everything that contributes to a role's permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    /// Ancestors of the role
    pub roles: BTreeMap<RoleId, RoleView>,
    /// The role itself
    pub role: EntityView,
    /// Nodes in effect for the role, expanded
    pub permission_tree: PermissionTree,
}

impl NodeAuthority {
    /// Collect the info view of a subject.
    ///
    /// `roles` holds every assigned role and all of their ancestors.
    ///
    /// # Errors
    ///
    /// `NotFound` if the subject is unknown
    pub fn subject_info(&self, subject: &str) -> RbacResult<SubjectInfo> {
        let entry = self.subject_entry(subject)?;

        let mut reachable = BTreeSet::new();
        for role in &entry.roles {
            reachable.insert(role.clone());
            reachable.extend(self.hierarchy().ancestors(role.as_str(), true)?);
        }

        let mut tree = PermissionTree::new();
        merge_grants(&mut tree, self.registry(), &entry.grants)?;
        let roles = self.role_views(&reachable, &mut tree)?;

        Ok(SubjectInfo {
            roles,
            subject: EntityView {
                entity_id: subject.to_string(),
                permission_nodes: entry.grants.to_nodes(self.registry())?,
                roles: entry.roles.iter().cloned().collect(),
            },
            permission_tree: tree,
        })
    }

    /// Collect the info view of a role.
    ///
    /// `roles` holds every ancestor of the role, the role itself excluded.
    ///
    /// # Errors
    ///
    /// `NotFound` if the role is unknown
    pub fn role_info(&self, role: &str) -> RbacResult<RoleInfo> {
        let entry = self.role_entry(role)?;
        let reachable = self.hierarchy().ancestors(role, true)?;

        let mut tree = PermissionTree::new();
        merge_grants(&mut tree, self.registry(), &entry.grants)?;
        let roles = self.role_views(&reachable, &mut tree)?;

        Ok(RoleInfo {
            roles,
            role: EntityView {
                entity_id: role.to_string(),
                permission_nodes: entry.grants.to_nodes(self.registry())?,
                roles: self.hierarchy().parents(role)?.into_iter().collect(),
            },
            permission_tree: tree,
        })
    }

    fn role_views(
        &self,
        reachable: &BTreeSet<RoleId>,
        tree: &mut PermissionTree,
    ) -> RbacResult<BTreeMap<RoleId, RoleView>> {
        let mut views = BTreeMap::new();
        for role in reachable {
            let entry = self.role_entry(role.as_str())?;
            merge_grants(tree, self.registry(), &entry.grants)?;
            views.insert(
                role.clone(),
                RoleView {
                    permission_nodes: entry.grants.to_nodes(self.registry())?,
                    parents: self.hierarchy().parents(role.as_str())?.into_iter().collect(),
                },
            );
        }
        Ok(views)
    }
}

/// Add every granted node of `grants` to `tree`, merging payloads of nodes
/// already present.
fn merge_grants(tree: &mut PermissionTree, registry: &NodeRegistry, grants: &GrantMap) -> RbacResult<()> {
    for (path, payloads) in grants.iter() {
        let node = registry.get(path)?;
        match tree.get_mut(path) {
            Some(TreeBranch::Payloads(existing)) => existing.extend(payloads.iter().cloned()),
            Some(_) => {}
            None => {
                let branch = if node.has_payload() {
                    TreeBranch::Payloads(payloads.clone())
                } else {
                    subtree(registry, node)?
                };
                tree.insert(path.to_string(), branch);
            }
        }
    }
    Ok(())
}

/// Expand a node into its registered descendants.
fn subtree(registry: &NodeRegistry, node: &PermissionNode) -> RbacResult<TreeBranch> {
    if node.has_payload() {
        return Ok(TreeBranch::Payloads(BTreeSet::new()));
    }
    if node.is_leaf() {
        return Ok(TreeBranch::Leaf);
    }
    let mut children = BTreeMap::new();
    for child in node.children() {
        children.insert(child.clone(), subtree(registry, registry.get(child)?)?);
    }
    Ok(TreeBranch::Children(children))
}
