//! Role DAG export
//!
//! A self-contained view of the role hierarchy as seen from a set of root
//! roles: the roots, every ancestor they inherit from, and the edges among
//! them. Descendants of the roots are never included. Member subjects and
//! granted permissions can be attached as extra nodes.
//!
//! [`RoleDag::to_dot`] renders the graph as Graphviz DOT text.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::directory::RbacState;
use crate::error::{RbacError, RbacResult};
use crate::ids::{RoleId, SubjectId};
use crate::permissions::Permission;

/// Role hierarchy graph with optional subject and permission nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleDag {
    /// Role nodes
    pub roles: BTreeSet<RoleId>,
    /// Hierarchy edges `(parent, child)`
    pub hierarchy: BTreeSet<(RoleId, RoleId)>,
    /// Subject nodes
    pub subjects: BTreeSet<SubjectId>,
    /// Member edges `(role, subject)`
    pub members: BTreeSet<(RoleId, SubjectId)>,
    /// Permission nodes
    pub permissions: BTreeSet<Permission>,
    /// Policy edges `(role, permission)`
    pub policies: BTreeSet<(RoleId, Permission)>,
}

impl RoleDag {
    /// Build the DAG from a state.
    ///
    /// # Arguments
    ///
    /// * `state` - The state to export
    /// * `root_roles` - Roots of the view, `None` for every role
    /// * `include_subjects` - Attach member subjects
    /// * `include_permissions` - Attach directly granted permissions
    ///
    /// # Errors
    ///
    /// `NotFound` if a root role is unknown
    pub fn build(
        state: &RbacState,
        root_roles: Option<&[&str]>,
        include_subjects: bool,
        include_permissions: bool,
    ) -> RbacResult<Self> {
        let directory = state.roles();
        let hierarchy = directory.hierarchy();

        let roles = match root_roles {
            None => directory.roles(),
            Some(roots) => {
                let unknown: Vec<&str> = roots
                    .iter()
                    .copied()
                    .filter(|r| !directory.contains(r))
                    .collect();
                match unknown.as_slice() {
                    [] => {}
                    [role] => return Err(RbacError::unknown_role(role)),
                    many => {
                        return Err(RbacError::NotFound(format!(
                            "Roles '{}' do not exist!",
                            many.join("', '")
                        )))
                    }
                }
                let mut roles = BTreeSet::new();
                for root in roots {
                    roles.insert(RoleId::new(*root)?);
                    roles.extend(hierarchy.ancestors(root, true)?);
                }
                roles
            }
        };

        let mut dag = RoleDag::default();
        for child in &roles {
            for parent in hierarchy.parents(child.as_str())? {
                dag.hierarchy.insert((parent, child.clone()));
            }
            if include_subjects {
                for subject in directory.members(child.as_str())? {
                    dag.subjects.insert(subject.clone());
                    dag.members.insert((child.clone(), subject.clone()));
                }
            }
            if include_permissions {
                for permission in directory.direct_permissions(child.as_str())? {
                    dag.permissions.insert(permission.clone());
                    dag.policies.insert((child.clone(), permission.clone()));
                }
            }
        }
        dag.roles = roles;
        Ok(dag)
    }

    /// Number of nodes of every kind.
    pub fn node_count(&self) -> usize {
        self.roles.len() + self.subjects.len() + self.permissions.len()
    }

    /// Number of edges of every kind.
    pub fn edge_count(&self) -> usize {
        self.hierarchy.len() + self.members.len() + self.policies.len()
    }

    /// Render as Graphviz DOT.
    ///
    /// Roles are boxes, subjects ellipses and permissions notes.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph roles {\n    rankdir=TB;\n");

        for role in &self.roles {
            let _ = writeln!(out, "    {} [label={}, shape=box];", role_node(role), quote(role.as_str()));
        }
        for subject in &self.subjects {
            let _ = writeln!(
                out,
                "    {} [label={}, shape=ellipse];",
                subject_node(subject),
                quote(subject.as_str())
            );
        }
        for permission in &self.permissions {
            let _ = writeln!(
                out,
                "    {} [label={}, shape=note];",
                permission_node(permission),
                quote(&permission.to_string())
            );
        }

        for (parent, child) in &self.hierarchy {
            let _ = writeln!(out, "    {} -> {};", role_node(parent), role_node(child));
        }
        for (role, subject) in &self.members {
            let _ = writeln!(
                out,
                "    {} -> {} [style=dashed];",
                role_node(role),
                subject_node(subject)
            );
        }
        for (role, permission) in &self.policies {
            let _ = writeln!(
                out,
                "    {} -> {} [style=dotted];",
                role_node(role),
                permission_node(permission)
            );
        }

        out.push_str("}\n");
        out
    }
}

fn role_node(role: &RoleId) -> String {
    quote(&format!("role:{role}"))
}

fn subject_node(subject: &SubjectId) -> String {
    quote(&format!("subject:{subject}"))
}

fn permission_node(permission: &Permission) -> String {
    quote(&format!("permission:{permission}"))
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl RbacState {
    /// Export the role hierarchy as a [`RoleDag`].
    pub fn role_dag(
        &self,
        root_roles: Option<&[&str]>,
        include_subjects: bool,
        include_permissions: bool,
    ) -> RbacResult<RoleDag> {
        RoleDag::build(self, root_roles, include_subjects, include_permissions)
    }
}
