//! # Permgraph RBAC (Role-Based Access Control)
//!
//! This crate provides the permission resolution engine of permgraph:
//! subjects, roles, permissions and policies, a multi-parent role hierarchy,
//! and the algorithm that decides whether a subject may perform an action on
//! a resource.
//!
//! ## Overview
//!
//! The permgraph-rbac crate handles:
//! - **Identifiers**: Non-empty subject and role ids
//! - **Permissions**: Resource type + resource id + action, with `*` as resource id wildcard
//! - **Policies**: A permission directly granted to a role
//! - **Hierarchy**: A DAG of roles; a child inherits everything its parents hold
//! - **Resolution**: Effective permissions, policies and actions for roles and subjects
//! - **Service**: Thread-safe administration and queries over a storage provider
//!
//! ## Architecture
//!
//! ```text
//! Permission = ResourceType[ResourceId]:Action
//!
//! Examples:
//!   "event[*]:view"   - View every event
//!   "event[19]:edit"  - Edit event 19 only
//!
//! Hierarchy (parent -> child):
//!   user -> editor -> admin
//!   admin inherits editor's and user's permissions
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use permgraph_rbac::{ErrorKind, Permission, Rbac};
//!
//! let rbac = Rbac::new();
//! rbac.create_role("user").unwrap();
//! rbac.create_role("admin").unwrap();
//! rbac.add_hierarchy("user", "admin").unwrap();
//!
//! rbac.grant_permission("user", &Permission::global("event", "view").unwrap()).unwrap();
//! rbac.grant_permission("admin", &Permission::global("event", "edit").unwrap()).unwrap();
//!
//! rbac.create_subject("Alex").unwrap();
//! rbac.create_subject("Ursula").unwrap();
//! rbac.assign_role("Alex", "admin").unwrap();
//! rbac.assign_role("Ursula", "user").unwrap();
//!
//! let edit = Permission::new("event", "5", "edit").unwrap();
//! assert!(rbac.check_permission("Alex", &edit).unwrap());
//! assert!(!rbac.check_permission("Ursula", &edit).unwrap());
//!
//! let err = rbac.assert_permission("Ursula", &edit).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::PermissionDenied);
//! ```
//!
//! ## Wildcards
//!
//! Only a granted resource id of `*` is a wildcard, and only in one direction:
//! - `event[*]:view` granted matches a request for `event[5]:view`
//! - `event[5]:view` granted does not match a request for `event[*]:view`
//!
//! Resource types and actions always match exactly.
//!
//! ## Persistence
//!
//! The engine keeps no backend-specific state. Durability is delegated to a
//! [`StorageProvider`]; [`MemoryStore`] is the default, file-backed storage
//! lives in `permgraph-store`.

pub mod dag;
pub mod directory;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod ids;
pub mod permissions;
pub mod provider;
pub mod service;
pub mod snapshot;

// Re-export main types for convenience
pub use dag::RoleDag;
pub use directory::{RbacState, RoleDirectory, SubjectDirectory};
pub use engine::Resolver;
pub use error::{ErrorKind, RbacError, RbacResult};
pub use hierarchy::{Edge, RoleHierarchy};
pub use ids::{RoleId, SubjectId};
pub use permissions::{Permission, PermissionSet, Policy, WILDCARD};
pub use provider::{Change, MemoryStore, StorageProvider};
pub use service::Rbac;
pub use snapshot::{RoleRecord, Snapshot, SubjectRecord};
