//! # Permgraph Store
//!
//! File-backed persistence for permgraph snapshots.
//!
//! ## Overview
//!
//! - [`FileStore`]: a [`StorageProvider`](permgraph_rbac::StorageProvider)
//!   that rewrites the snapshot file after every committed mutation
//! - [`save_authority`] / [`load_authority`]: snapshot files for the
//!   permission-node [`NodeAuthority`](permgraph_nodes::NodeAuthority)
//! - [`StoreConfig`]: file path and flags, loadable from `PERMGRAPH_*`
//!   environment variables
//!
//! The format follows the file extension: `.json`, `.yaml` or `.yml`.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use permgraph_rbac::{Permission, Rbac};
//! use permgraph_store::FileStore;
//!
//! let store = FileStore::from_env().unwrap();
//! let rbac = Rbac::with_provider(Arc::new(store)).unwrap();
//!
//! rbac.create_role("admin").unwrap();
//! rbac.grant_permission("admin", &Permission::global("event", "edit").unwrap()).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod nodes;

pub use config::{ConfigError, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use file::{read_snapshot, write_snapshot, FileStore};
pub use format::SnapshotFormat;
pub use nodes::{load_authority, save_authority};
