//! File-backed snapshot storage
//!
//! Snapshots are written as a whole: the document goes to a sibling
//! `<name>.tmp` file first, which is then renamed over the target, so a
//! crash mid-write never leaves a truncated snapshot behind.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use permgraph_rbac::{Change, Permission, RbacError, RbacResult, RbacState, Snapshot, StorageProvider};

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::format::SnapshotFormat;

/// Write a snapshot document to `path`.
///
/// Missing parent directories are created.
pub fn write_snapshot<P: Serialize>(
    path: &Path,
    format: SnapshotFormat,
    pretty: bool,
    snapshot: &Snapshot<P>,
) -> StoreResult<()> {
    let text = format.encode(snapshot, pretty)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, text)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    info!(
        path = %path.display(),
        format = %format,
        roles = snapshot.roles.len(),
        subjects = snapshot.subjects.len(),
        "Saved snapshot"
    );
    Ok(())
}

/// Read a snapshot document from `path`.
///
/// # Returns
///
/// `None` if the file does not exist; an empty file reads as an empty snapshot
pub fn read_snapshot<P: DeserializeOwned>(
    path: &Path,
    format: SnapshotFormat,
) -> StoreResult<Option<Snapshot<P>>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if text.trim().is_empty() {
        return Ok(Some(Snapshot::new()));
    }

    let snapshot: Snapshot<P> = format.decode(&text)?;
    info!(
        path = %path.display(),
        format = %format,
        roles = snapshot.roles.len(),
        subjects = snapshot.subjects.len(),
        "Read snapshot"
    );
    Ok(Some(snapshot))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) fn missing_file(path: &Path) -> RbacError {
    RbacError::Storage(format!("Snapshot file '{}' does not exist!", path.display()))
}

/// Storage provider persisting the full snapshot to a JSON or YAML file
/// after every commit.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use permgraph_rbac::Rbac;
/// use permgraph_store::{FileStore, StoreConfig};
///
/// let store = FileStore::new(StoreConfig::for_file("roles.yaml")).unwrap();
/// let rbac = Rbac::with_provider(Arc::new(store)).unwrap();
/// rbac.create_role("admin").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    config: StoreConfig,
    format: SnapshotFormat,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store for the configured file.
    ///
    /// # Errors
    ///
    /// `Config` if the file path is empty or has an unsupported extension
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let format = config.format()?;
        Ok(Self {
            config,
            format,
            write_lock: Mutex::new(()),
        })
    }

    /// Create a store from `PERMGRAPH_*` environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    /// The store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.config.data_file
    }

    /// The snapshot format.
    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Read the snapshot file, `None` if it does not exist.
    pub fn read(&self) -> StoreResult<Option<Snapshot<Permission>>> {
        read_snapshot(self.path(), self.format)
    }

    /// Overwrite the snapshot file.
    pub fn write(&self, snapshot: &Snapshot<Permission>) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        write_snapshot(self.path(), self.format, self.config.pretty, snapshot)
    }
}

impl StorageProvider for FileStore {
    fn load(&self) -> RbacResult<Option<Snapshot<Permission>>> {
        if let Some(snapshot) = self.read()? {
            return Ok(Some(snapshot));
        }
        if !self.config.create_if_missing {
            return Err(missing_file(self.path()));
        }
        debug!(path = %self.path().display(), "Creating empty snapshot file");
        self.write(&Snapshot::new())?;
        Ok(None)
    }

    fn commit(&self, changes: &[Change], state: &RbacState) -> RbacResult<()> {
        self.write(&state.to_snapshot())?;
        debug!(path = %self.path().display(), changes = changes.len(), "Committed changes");
        Ok(())
    }
}
