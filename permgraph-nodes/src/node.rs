//! # Permission Node Registry
//!
//! Permission nodes are dotted paths forming a tree under the root node `*`.
//!
//! ```text
//! *                       root, holding it grants everything
//! ├── chat.*              branch (trailing `*`)
//! │   ├── chat.read       leaf
//! │   └── chat.room.*     branch
//! │       └── chat.room.<x>   payload leaf, granted per payload
//! └── ping                leaf directly under the root
//! ```
//!
//! The parent of `a.b.c` and of `a.b.*` is `a.*`; single-section nodes hang
//! off the root. A node can only be registered once its parent exists.
//!
//! Payload leaves are serialized with the payload in place of `x`:
//! `chat.room.<x>` with payload `lobby` is written `chat.room.<lobby>`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use permgraph_rbac::{RbacError, RbacResult};

/// The root node. Holding it grants every registered node.
pub const ROOT: &str = "*";

const WILDCARD_SECTION: &str = "*";
const PAYLOAD_SECTION: &str = "<x>";

/// Position of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The root node `*`
    Root,
    /// A node with a trailing `*` that may have children
    Branch,
    /// A plain leaf
    Leaf,
    /// A leaf ending in `<x>`, granted per payload
    PayloadLeaf,
}

/// A registered permission node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionNode {
    path: String,
    kind: NodeKind,
    parent: Option<String>,
    children: BTreeSet<String>,
}

impl PermissionNode {
    /// The dotted path, e.g. `chat.room.<x>`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The node kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The parent path, `None` for the root.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Paths of the registered children.
    pub fn children(&self) -> &BTreeSet<String> {
        &self.children
    }

    /// Check if the node cannot have children.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf | NodeKind::PayloadLeaf)
    }

    /// Check if grants of this node carry a payload.
    pub fn has_payload(&self) -> bool {
        self.kind == NodeKind::PayloadLeaf
    }
}

/// Runtime registry of permission nodes.
///
/// # Example
///
/// ```
/// use permgraph_nodes::{NodeKind, NodeRegistry};
///
/// let registry = NodeRegistry::with_nodes(["chat.*", "chat.read", "chat.room.*", "chat.room.<x>"]).unwrap();
///
/// assert_eq!(registry.get("chat.room.<x>").unwrap().kind(), NodeKind::PayloadLeaf);
/// assert_eq!(registry.ancestors("chat.read").unwrap(), vec!["chat.*", "*"]);
/// assert_eq!(registry.serialize("chat.room.<x>", Some("lobby")).unwrap(), "chat.room.<lobby>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRegistry {
    nodes: HashMap<String, PermissionNode>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT.to_string(),
            PermissionNode {
                path: ROOT.to_string(),
                kind: NodeKind::Root,
                parent: None,
                children: BTreeSet::new(),
            },
        );
        Self { nodes }
    }
}

impl NodeRegistry {
    /// Create a registry holding only the root node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry and register `nodes` in order.
    ///
    /// Parents must come before their children.
    pub fn with_nodes<I, S>(nodes: I) -> RbacResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for node in nodes {
            registry.register(node.as_ref())?;
        }
        Ok(registry)
    }

    /// Register a node.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the node is registered
    /// - `InvalidArgument` if the node is malformed, its parent is not
    ///   registered, or its parent is a leaf
    pub fn register(&mut self, node: &str) -> RbacResult<&PermissionNode> {
        if self.nodes.contains_key(node) {
            return Err(RbacError::AlreadyExists(format!(
                "Permission node '{node}' has been registered before!"
            )));
        }
        let (kind, parent) = parse(node)?;

        match self.nodes.get_mut(&parent) {
            Some(p) if p.is_leaf() => {
                return Err(RbacError::InvalidArgument(format!(
                    "The desired parent permission '{parent}' is a leaf permission!"
                )));
            }
            Some(p) => {
                p.children.insert(node.to_string());
            }
            None => {
                let bare = parent.trim_end_matches(".*");
                if self.nodes.get(bare).is_some_and(PermissionNode::is_leaf) {
                    return Err(RbacError::InvalidArgument(format!(
                        "The desired parent permission '{bare}' is a leaf permission!"
                    )));
                }
                return Err(RbacError::InvalidArgument(format!(
                    "A nested permission requires the parent permission '{parent}'!"
                )));
            }
        }

        tracing::debug!(node = %node, parent = %parent, "Registered permission node");
        let entry = self.nodes.entry(node.to_string()).or_insert(PermissionNode {
            path: node.to_string(),
            kind,
            parent: Some(parent),
            children: BTreeSet::new(),
        });
        Ok(entry)
    }

    /// Check if a node is registered.
    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    /// Look up a registered node.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the node is not registered
    pub fn get(&self, node: &str) -> RbacResult<&PermissionNode> {
        self.nodes.get(node).ok_or_else(|| {
            RbacError::InvalidArgument(format!("Unknown permission node '{node}'!"))
        })
    }

    /// The root node.
    pub fn root(&self) -> &PermissionNode {
        &self.nodes[ROOT]
    }

    /// Number of registered nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if only the root is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// All registered paths, sorted.
    pub fn paths(&self) -> BTreeSet<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    /// Ancestors of a node, nearest first, ending with the root.
    pub fn ancestors(&self, node: &str) -> RbacResult<Vec<&str>> {
        let mut current = self.get(node)?;
        let mut chain = Vec::new();
        while let Some(parent) = current.parent.as_deref() {
            current = self.get(parent)?;
            chain.push(current.path.as_str());
        }
        Ok(chain)
    }

    /// Look up a node and check that `payload` fits it.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the node is unknown, a payload node gets no
    /// payload, or any other node gets one
    pub fn validate(&self, node: &str, payload: Option<&str>) -> RbacResult<&PermissionNode> {
        let entry = self.get(node)?;
        match (entry.has_payload(), payload) {
            (true, None) => Err(RbacError::InvalidArgument(format!(
                "Permission node '{node}' requires a payload!"
            ))),
            (true, Some("")) => Err(RbacError::InvalidArgument(
                "Payload cannot be empty!".to_string(),
            )),
            (false, Some(_)) => Err(RbacError::InvalidArgument(format!(
                "Permission node '{node}' does not take a payload!"
            ))),
            _ => Ok(entry),
        }
    }

    /// Serialize a node and its payload.
    pub fn serialize(&self, node: &str, payload: Option<&str>) -> RbacResult<String> {
        let entry = self.validate(node, payload)?;
        Ok(match payload {
            Some(payload) if entry.has_payload() => {
                let stem = &node[..node.len() - PAYLOAD_SECTION.len()];
                format!("{stem}<{payload}>")
            }
            _ => node.to_string(),
        })
    }

    /// Parse a serialized node back into the registered node and its payload.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if no registered node matches
    pub fn deserialize(&self, serialized: &str) -> RbacResult<(&PermissionNode, Option<String>)> {
        if let Ok(entry) = self.get(serialized) {
            if !entry.has_payload() {
                return Ok((entry, None));
            }
        }

        if serialized.ends_with('>') {
            // the payload section starts at a '<' that opens a section
            for (i, _) in serialized.match_indices('<') {
                if i > 0 && !serialized[..i].ends_with('.') {
                    continue;
                }
                let candidate = format!("{}{PAYLOAD_SECTION}", &serialized[..i]);
                let payload = &serialized[i + 1..serialized.len() - 1];
                if let Some(entry) = self.nodes.get(&candidate) {
                    if entry.has_payload() && !payload.is_empty() {
                        return Ok((entry, Some(payload.to_string())));
                    }
                }
            }
        }

        Err(RbacError::InvalidArgument(format!(
            "Unknown permission node '{serialized}'!"
        )))
    }
}

/// Determine kind and parent path of a new node.
fn parse(node: &str) -> RbacResult<(NodeKind, String)> {
    let malformed = || RbacError::InvalidArgument(format!("Malformed permission node '{node}'!"));
    if node.is_empty() {
        return Err(RbacError::InvalidArgument(
            "Permission node cannot be empty!".to_string(),
        ));
    }

    let sections: Vec<&str> = node.split('.').collect();
    let last = sections.len() - 1;
    for (i, section) in sections.iter().enumerate() {
        let is_last = i == last;
        if section.is_empty() {
            return Err(malformed());
        }
        if *section == WILDCARD_SECTION && !is_last {
            return Err(malformed());
        }
        if (section.starts_with('<') || section.ends_with('>'))
            && !(*section == PAYLOAD_SECTION && is_last)
        {
            return Err(malformed());
        }
    }

    let (kind, parent_sections) = match sections[last] {
        WILDCARD_SECTION if last == 0 => return Err(malformed()),
        WILDCARD_SECTION => (NodeKind::Branch, &sections[..last - 1]),
        PAYLOAD_SECTION => (NodeKind::PayloadLeaf, &sections[..last]),
        _ => (NodeKind::Leaf, &sections[..last]),
    };

    let parent = if parent_sections.is_empty() {
        ROOT.to_string()
    } else {
        format!("{}.{WILDCARD_SECTION}", parent_sections.join("."))
    };
    Ok((kind, parent))
}
