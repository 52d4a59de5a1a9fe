//! Round trips through snapshot files in a temporary directory.

use std::fs;
use std::sync::Arc;

use permgraph_nodes::{NodeAuthority, NodeRegistry};
use permgraph_rbac::{Permission, Rbac, RbacError, Snapshot};
use permgraph_store::{
    load_authority, read_snapshot, save_authority, FileStore, SnapshotFormat, StoreConfig,
    StoreError,
};

fn perm(resource_type: &str, resource_id: &str, action: &str) -> Permission {
    Permission::new(resource_type, resource_id, action).unwrap()
}

fn populate(rbac: &Rbac) {
    for role in ["user", "editor", "admin"] {
        rbac.create_role(role).unwrap();
    }
    rbac.add_hierarchy("user", "editor").unwrap();
    rbac.add_hierarchy("editor", "admin").unwrap();
    rbac.grant_permission("user", &perm("event", "*", "view")).unwrap();
    rbac.grant_permission("admin", &perm("event", "*", "delete")).unwrap();
    rbac.create_subject("Alex").unwrap();
    rbac.assign_role("Alex", "editor").unwrap();
}

#[test]
fn test_rbac_survives_restart_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_file(dir.path().join("roles.json"));

    let first = Rbac::with_provider(Arc::new(FileStore::new(config.clone()).unwrap())).unwrap();
    populate(&first);

    let second = Rbac::with_provider(Arc::new(FileStore::new(config).unwrap())).unwrap();
    assert_eq!(second.state(), first.state());
    assert!(second.check_permission("Alex", &perm("event", "7", "view")).unwrap());
    assert!(!second.check_permission("Alex", &perm("event", "7", "delete")).unwrap());
}

#[test]
fn test_rbac_survives_restart_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_file(dir.path().join("roles.yaml"));

    let first = Rbac::with_provider(Arc::new(FileStore::new(config.clone()).unwrap())).unwrap();
    populate(&first);
    first.delete_role("admin").unwrap();

    let text = fs::read_to_string(&config.data_file).unwrap();
    assert!(text.contains("editor"));
    assert!(!text.contains("admin"));

    let second = Rbac::with_provider(Arc::new(FileStore::new(config).unwrap())).unwrap();
    assert_eq!(second.state(), first.state());
}

#[test]
fn test_document_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::for_file(dir.path().join("roles.json"));
    config.pretty = false;

    let rbac = Rbac::with_provider(Arc::new(FileStore::new(config.clone()).unwrap())).unwrap();
    rbac.create_role("user").unwrap();
    rbac.create_subject("Alex").unwrap();
    rbac.assign_role("Alex", "user").unwrap();

    assert_eq!(
        fs::read_to_string(&config.data_file).unwrap(),
        r#"{"roles":{"user":{"subjects":["Alex"]}},"subjects":{"Alex":{}}}"#
    );
    assert!(!dir.path().join("roles.json.tmp").exists());
}

#[test]
fn test_corrupt_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_file(dir.path().join("roles.json"));
    fs::write(&config.data_file, "{ roles: ").unwrap();

    let err = Rbac::with_provider(Arc::new(FileStore::new(config).unwrap())).unwrap_err();
    assert!(matches!(err, RbacError::Serialization(_)));
}

#[test]
fn test_dangling_reference_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_file(dir.path().join("roles.yml"));
    fs::write(&config.data_file, "roles:\n  user:\n    children: [ghost]\n").unwrap();

    let err = Rbac::with_provider(Arc::new(FileStore::new(config).unwrap())).unwrap_err();
    assert_eq!(err, RbacError::NotFound("Role 'ghost' does not exist!".into()));
}

#[test]
fn test_unsupported_extension() {
    let err = FileStore::new(StoreConfig::for_file("roles.toml")).unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
    assert_eq!(err.error_code(), "CONFIG_ERROR");
}

fn registry() -> NodeRegistry {
    NodeRegistry::with_nodes(["chat.*", "chat.read", "chat.room.*", "chat.room.<x>"]).unwrap()
}

#[test]
fn test_node_authority_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_file(dir.path().join("nodes.yaml"));

    let mut authority = NodeAuthority::new(registry());
    authority.create_role("member").unwrap();
    authority.role_grant("member", "chat.read", None).unwrap();
    authority.role_grant("member", "chat.room.<x>", Some("lobby")).unwrap();
    authority.create_subject("Alice").unwrap();
    authority.role_add_subject("member", "Alice").unwrap();
    save_authority(&authority, &config).unwrap();

    let stored: Snapshot<String> = read_snapshot(&config.data_file, SnapshotFormat::Yaml)
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.roles["member"].permissions,
        vec!["chat.read", "chat.room.<lobby>"]
    );

    let mut restored = NodeAuthority::new(registry());
    assert!(load_authority(&mut restored, &config).unwrap());
    assert_eq!(restored, authority);
    assert!(restored
        .subject_has_permission("Alice", "chat.room.<x>", Some("lobby"))
        .unwrap());
}

#[test]
fn test_node_authority_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::for_file(dir.path().join("nodes.json"));
    let mut authority = NodeAuthority::new(registry());

    config.create_if_missing = false;
    assert!(load_authority(&mut authority, &config).is_err());

    config.create_if_missing = true;
    assert!(!load_authority(&mut authority, &config).unwrap());
    assert!(config.data_file.exists());
    assert!(load_authority(&mut authority, &config).unwrap());
}

#[test]
fn test_node_authority_unknown_node_leaves_target_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_file(dir.path().join("nodes.json"));
    fs::write(
        &config.data_file,
        r#"{"subjects":{"Alice":{"permissions":["mail.read"]}}}"#,
    )
    .unwrap();

    let mut authority = NodeAuthority::new(registry());
    authority.create_subject("Bob").unwrap();
    let before = authority.clone();

    let err = load_authority(&mut authority, &config).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    assert_eq!(authority, before);
}
