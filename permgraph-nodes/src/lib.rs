//! # Permgraph Nodes
//!
//! Permission-node trees for permgraph.
//!
//! ## Overview
//!
//! Instead of resource/action permissions, applications register dotted
//! permission nodes at runtime and grant them to subjects and roles:
//!
//! - **Nodes**: `chat.*` (branch), `chat.read` (leaf), `chat.room.<x>`
//!   (payload leaf, granted per payload such as `chat.room.<lobby>`)
//! - **Inheritance**: holding a branch grants every node below it, holding
//!   the root `*` grants everything
//! - **Roles**: the same acyclic multi-parent hierarchy as `permgraph-rbac`
//!
//! ## Usage
//!
//! ```
//! use permgraph_nodes::{NodeAuthority, NodeRegistry};
//!
//! let registry = NodeRegistry::with_nodes(["chat.*", "chat.read", "chat.write"]).unwrap();
//! let mut authority = NodeAuthority::new(registry);
//!
//! authority.create_role("moderator").unwrap();
//! authority.role_grant("moderator", "chat.*", None).unwrap();
//! authority.create_subject("Bob").unwrap();
//! authority.role_add_subject("moderator", "Bob").unwrap();
//!
//! assert!(authority.subject_has_permission("Bob", "chat.write", None).unwrap());
//! ```

pub mod authority;
pub mod grants;
pub mod info;
pub mod node;

pub use authority::NodeAuthority;
pub use grants::{GrantMap, PermissionNodes};
pub use info::{EntityView, PermissionTree, RoleInfo, RoleView, SubjectInfo, TreeBranch};
pub use node::{NodeKind, NodeRegistry, PermissionNode, ROOT};
