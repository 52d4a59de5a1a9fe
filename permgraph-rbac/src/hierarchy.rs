//! Role hierarchy graph
//!
//! A directed acyclic graph over roles. An edge `parent -> child` means the
//! child inherits every permission of the parent, directly granted or
//! inherited. Roles may have any number of parents and children.
//!
//! The graph stays acyclic at all times: [`RoleHierarchy::add_edge`] checks
//! reachability before inserting and leaves the graph untouched on failure.
//! Traversals keep a visited set, so a shared ancestor reached through several
//! paths (diamond inheritance) is visited and reported once.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::{RbacError, RbacResult};
use crate::ids::RoleId;

/// A hierarchy edge as `(parent, child)`.
pub type Edge = (RoleId, RoleId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Towards parents (ancestors)
    Up,
    /// Towards children (descendants)
    Down,
}

/// Multi-parent role hierarchy.
///
/// # Example
///
/// ```
/// use permgraph_rbac::hierarchy::RoleHierarchy;
/// use permgraph_rbac::RoleId;
///
/// let mut graph = RoleHierarchy::new();
/// for role in ["user", "editor", "admin"] {
///     graph.add_role(RoleId::new(role).unwrap());
/// }
/// graph.add_edge("user", "editor").unwrap();
/// graph.add_edge("editor", "admin").unwrap();
///
/// let ancestors = graph.ancestors("admin", true).unwrap();
/// assert!(ancestors.contains("user"));
/// assert!(graph.add_edge("admin", "user").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleHierarchy {
    /// role -> direct parents
    parents: HashMap<RoleId, BTreeSet<RoleId>>,
    /// role -> direct children
    children: HashMap<RoleId, BTreeSet<RoleId>>,
}

impl RoleHierarchy {
    /// Create a new empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role node without edges.
    ///
    /// # Returns
    ///
    /// `true` if the role was not known before
    pub fn add_role(&mut self, role: RoleId) -> bool {
        if self.parents.contains_key(&role) {
            return false;
        }
        self.children.insert(role.clone(), BTreeSet::new());
        self.parents.insert(role, BTreeSet::new());
        true
    }

    /// Check if the role is part of the hierarchy.
    pub fn contains(&self, role: &str) -> bool {
        self.parents.contains_key(role)
    }

    /// Iterate over all roles in no particular order.
    pub fn roles(&self) -> impl Iterator<Item = &RoleId> {
        self.parents.keys()
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Check if the hierarchy has no roles.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Delete a role and every edge touching it.
    ///
    /// Parents and children of the removed role are not re-linked.
    ///
    /// # Returns
    ///
    /// The removed edges as `(parent, child)` pairs
    pub fn remove_role(&mut self, role: &str) -> RbacResult<Vec<Edge>> {
        let (key, parents) = self
            .parents
            .remove_entry(role)
            .ok_or_else(|| RbacError::unknown_role(role))?;
        let children = self.children.remove(role).unwrap_or_default();

        let mut removed = Vec::with_capacity(parents.len() + children.len());
        for parent in parents {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(role);
            }
            removed.push((parent, key.clone()));
        }
        for child in children {
            if let Some(co_parents) = self.parents.get_mut(&child) {
                co_parents.remove(role);
            }
            removed.push((key.clone(), child));
        }
        Ok(removed)
    }

    /// Add the edge `parent -> child`.
    ///
    /// # Returns
    ///
    /// `true` if the edge was added, `false` if it already existed
    ///
    /// # Errors
    ///
    /// - `NotFound` if either role is unknown
    /// - `Cycle` if `parent == child` or `child` already reaches `parent`
    pub fn add_edge(&mut self, parent: &str, child: &str) -> RbacResult<bool> {
        let (parent_id, child_id) = self.require_pair(parent, child)?;
        if parent == child || self.reaches(child, parent) {
            return Err(RbacError::cycle());
        }
        let inserted = self
            .children
            .get_mut(parent)
            .map(|children| children.insert(child_id))
            .unwrap_or(false);
        if !inserted {
            return Ok(false);
        }
        if let Some(parents) = self.parents.get_mut(child) {
            parents.insert(parent_id);
        }
        Ok(true)
    }

    /// Remove exactly the edge `parent -> child`.
    ///
    /// Transitively implied inheritance through other paths is left intact
    /// and no replacement edges are added.
    ///
    /// # Returns
    ///
    /// `true` if the edge existed
    ///
    /// # Errors
    ///
    /// `NotFound` if either role is unknown
    pub fn remove_edge(&mut self, parent: &str, child: &str) -> RbacResult<bool> {
        self.require_pair(parent, child)?;
        let removed = self
            .children
            .get_mut(parent)
            .map(|children| children.remove(child))
            .unwrap_or(false);
        if removed {
            if let Some(parents) = self.parents.get_mut(child) {
                parents.remove(parent);
            }
        }
        Ok(removed)
    }

    /// Check if the edge `parent -> child` exists.
    pub fn has_edge(&self, parent: &str, child: &str) -> bool {
        self.children
            .get(parent)
            .map(|children| children.contains(child))
            .unwrap_or(false)
    }

    /// All edges as `(parent, child)` pairs, ordered.
    pub fn edges(&self) -> BTreeSet<Edge> {
        self.children
            .iter()
            .flat_map(|(parent, children)| {
                children
                    .iter()
                    .map(move |child| (parent.clone(), child.clone()))
            })
            .collect()
    }

    /// Direct parents of a role.
    pub fn parents(&self, role: &str) -> RbacResult<BTreeSet<RoleId>> {
        self.parents
            .get(role)
            .cloned()
            .ok_or_else(|| RbacError::unknown_role(role))
    }

    /// Direct children of a role.
    pub fn children(&self, role: &str) -> RbacResult<BTreeSet<RoleId>> {
        self.children
            .get(role)
            .cloned()
            .ok_or_else(|| RbacError::unknown_role(role))
    }

    /// Roles `role` inherits from.
    ///
    /// # Arguments
    ///
    /// * `role` - The role to start from (not included in the result)
    /// * `transitive` - `false` for direct parents only, `true` for all ancestors
    pub fn ancestors(&self, role: &str, transitive: bool) -> RbacResult<BTreeSet<RoleId>> {
        if !transitive {
            return self.parents(role);
        }
        self.walk(role, Direction::Up)
    }

    /// Roles inheriting from `role`.
    ///
    /// # Arguments
    ///
    /// * `role` - The role to start from (not included in the result)
    /// * `transitive` - `false` for direct children only, `true` for all descendants
    pub fn descendants(&self, role: &str, transitive: bool) -> RbacResult<BTreeSet<RoleId>> {
        if !transitive {
            return self.children(role);
        }
        self.walk(role, Direction::Down)
    }

    /// Check if `to` is `from` itself or one of its descendants.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        if from == to {
            return self.contains(from);
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let Some(children) = self.children.get(current) else {
                continue;
            };
            for child in children {
                if child.as_str() == to {
                    return true;
                }
                if visited.insert(child.as_str()) {
                    queue.push_back(child.as_str());
                }
            }
        }
        false
    }

    /// Breadth-first walk collecting every role reachable from `start`.
    fn walk(&self, start: &str, direction: Direction) -> RbacResult<BTreeSet<RoleId>> {
        let adjacency = match direction {
            Direction::Up => &self.parents,
            Direction::Down => &self.children,
        };
        if !adjacency.contains_key(start) {
            return Err(RbacError::unknown_role(start));
        }

        let mut visited: BTreeSet<RoleId> = BTreeSet::new();
        let mut queue: VecDeque<&RoleId> = VecDeque::new();
        queue.extend(adjacency[start].iter());

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(next) = adjacency.get(current) {
                queue.extend(next.iter().filter(|r| !visited.contains(*r)));
            }
        }
        Ok(visited)
    }

    fn require_pair(&self, parent: &str, child: &str) -> RbacResult<(RoleId, RoleId)> {
        let parent_id = self.parents.get_key_value(parent).map(|(k, _)| k.clone());
        let child_id = self.parents.get_key_value(child).map(|(k, _)| k.clone());
        match (parent_id, child_id) {
            (Some(p), Some(c)) => Ok((p, c)),
            (Some(_), None) => Err(RbacError::unknown_role(child)),
            (None, Some(_)) => Err(RbacError::unknown_role(parent)),
            (None, None) if parent == child => Err(RbacError::unknown_role(parent)),
            (None, None) => Err(RbacError::NotFound(format!(
                "Roles '{parent}' and '{child}' do not exist!"
            ))),
        }
    }
}
