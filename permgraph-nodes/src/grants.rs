//! Per-entity node grants
//!
//! Each subject and role holds a [`GrantMap`]: granted node paths mapped to
//! their payloads. Plain nodes map to an empty payload set; payload leaves
//! keep an entry only while at least one payload is granted.

use std::collections::{BTreeMap, BTreeSet};

use permgraph_rbac::RbacResult;

use crate::node::{NodeRegistry, PermissionNode};

/// Granted nodes with their payloads, as exposed to callers.
///
/// `None` for plain nodes, the granted payloads for payload leaves.
pub type PermissionNodes = BTreeMap<String, Option<BTreeSet<String>>>;

/// Node grants of one subject or role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantMap {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl GrantMap {
    /// Create an empty grant map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a validated node.
    ///
    /// # Returns
    ///
    /// `true` if the grant was not present before
    pub fn grant(&mut self, node: &PermissionNode, payload: Option<&str>) -> bool {
        match payload {
            Some(payload) => self
                .entries
                .entry(node.path().to_string())
                .or_default()
                .insert(payload.to_string()),
            None => {
                if self.entries.contains_key(node.path()) {
                    return false;
                }
                self.entries.insert(node.path().to_string(), BTreeSet::new());
                true
            }
        }
    }

    /// Revoke a validated node.
    ///
    /// Payload leaves are revoked one payload at a time; the node entry goes
    /// away with its last payload. Plain nodes are revoked without a payload.
    ///
    /// # Returns
    ///
    /// `true` if something was removed
    pub fn revoke(&mut self, node: &PermissionNode, payload: Option<&str>) -> bool {
        let Some(payload) = payload else {
            return self.entries.remove(node.path()).is_some();
        };
        let Some(payloads) = self.entries.get_mut(node.path()) else {
            return false;
        };
        let removed = payloads.remove(payload);
        if payloads.is_empty() {
            self.entries.remove(node.path());
        }
        removed
    }

    /// Check whether this map covers `node`.
    ///
    /// A node is covered if any of its ancestors is granted, or the node
    /// itself is granted (for the requested payload, when one is given).
    pub fn holds(&self, registry: &NodeRegistry, node: &PermissionNode, payload: Option<&str>) -> RbacResult<bool> {
        for ancestor in registry.ancestors(node.path())? {
            if self.entries.contains_key(ancestor) {
                return Ok(true);
            }
        }
        Ok(match (self.entries.get(node.path()), payload) {
            (None, _) => false,
            (Some(payloads), Some(payload)) => payloads.contains(payload),
            (Some(_), None) => true,
        })
    }

    /// Check if nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of granted nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over granted node paths and their payloads.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(node, payloads)| (node.as_str(), payloads))
    }

    /// Export as [`PermissionNodes`].
    pub fn to_nodes(&self, registry: &NodeRegistry) -> RbacResult<PermissionNodes> {
        let mut nodes = PermissionNodes::new();
        for (path, payloads) in &self.entries {
            let entry = registry.get(path)?;
            let value = entry.has_payload().then(|| payloads.clone());
            nodes.insert(path.clone(), value);
        }
        Ok(nodes)
    }

    /// Serialized grant strings, one per node or node payload.
    pub fn serialized(&self, registry: &NodeRegistry) -> RbacResult<Vec<String>> {
        let mut out = Vec::with_capacity(self.entries.len());
        for (path, payloads) in &self.entries {
            if payloads.is_empty() {
                out.push(registry.serialize(path, None)?);
            } else {
                for payload in payloads {
                    out.push(registry.serialize(path, Some(payload))?);
                }
            }
        }
        Ok(out)
    }
}
