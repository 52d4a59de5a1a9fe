//! Snapshot files for [`NodeAuthority`]
//!
//! Node grants are stored in their serialized form (`chat.room.<lobby>`),
//! so the registry used for loading must contain every stored node.

use tracing::debug;

use permgraph_nodes::NodeAuthority;
use permgraph_rbac::Snapshot;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::file::{missing_file, read_snapshot, write_snapshot};

/// Save the subjects, roles and grants of an authority.
pub fn save_authority(authority: &NodeAuthority, config: &StoreConfig) -> StoreResult<()> {
    let format = config.format()?;
    let snapshot = authority.to_snapshot()?;
    write_snapshot(&config.data_file, format, config.pretty, &snapshot)
}

/// Replace the subjects, roles and grants of an authority with the file content.
///
/// # Returns
///
/// `false` if the file did not exist (it is created empty when
/// `create_if_missing` is set, and the authority is left as it is)
///
/// # Errors
///
/// - `Rbac` if the file references unknown nodes, roles or subjects, or
///   its hierarchy has a cycle; the authority is left unchanged
/// - `Io`, `Json`, `Yaml` for unreadable files
pub fn load_authority(authority: &mut NodeAuthority, config: &StoreConfig) -> StoreResult<bool> {
    let format = config.format()?;
    match read_snapshot::<String>(&config.data_file, format)? {
        Some(snapshot) => {
            authority.load_snapshot(&snapshot)?;
            Ok(true)
        }
        None if config.create_if_missing => {
            debug!(path = %config.data_file.display(), "Creating empty snapshot file");
            write_snapshot::<String>(&config.data_file, format, config.pretty, &Snapshot::new())?;
            Ok(false)
        }
        None => Err(missing_file(&config.data_file).into()),
    }
}
