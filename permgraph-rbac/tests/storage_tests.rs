//! Storage provider and concurrency tests for the `Rbac` service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use permgraph_rbac::{
    Change, MemoryStore, Permission, Rbac, RbacError, RbacResult, RbacState, RoleId, Snapshot,
    StorageProvider,
};

fn perm(resource_type: &str, resource_id: &str, action: &str) -> Permission {
    Permission::new(resource_type, resource_id, action).unwrap()
}

/// Provider that can be switched to reject commits.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl StorageProvider for FlakyStore {
    fn load(&self) -> RbacResult<Option<Snapshot<Permission>>> {
        self.inner.load()
    }

    fn commit(&self, changes: &[Change], state: &RbacState) -> RbacResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RbacError::Storage("connection lost".into()));
        }
        self.inner.commit(changes, state)
    }
}

#[test]
fn test_cascade_is_atomic_on_commit_failure() {
    let store = Arc::new(FlakyStore::default());
    let rbac = Rbac::with_provider(store.clone()).unwrap();
    rbac.create_role("user").unwrap();
    rbac.create_role("admin").unwrap();
    rbac.add_hierarchy("user", "admin").unwrap();
    rbac.grant_permission("user", &perm("event", "*", "view")).unwrap();
    rbac.create_subject("Alex").unwrap();
    rbac.assign_role("Alex", "user").unwrap();

    let before = rbac.state();
    store.failing.store(true, Ordering::SeqCst);

    let err = rbac.delete_role("user").unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(err.error_code(), "STORAGE_ERROR");
    assert_eq!(rbac.state(), before);
    assert!(rbac.check_permission("Alex", &perm("event", "1", "view")).unwrap());

    store.failing.store(false, Ordering::SeqCst);
    rbac.delete_role("user").unwrap();
    assert!(!rbac.check_permission("Alex", &perm("event", "1", "view")).unwrap());
}

#[test]
fn test_journal_records_expanded_cascade() {
    let store = Arc::new(MemoryStore::new());
    let rbac = Rbac::with_provider(store.clone()).unwrap();
    rbac.create_role("user").unwrap();
    rbac.create_role("admin").unwrap();
    rbac.add_hierarchy("user", "admin").unwrap();

    rbac.delete_role("admin").unwrap();

    let journal = store.journal();
    assert_eq!(
        &journal[journal.len() - 2..],
        &[
            Change::RemoveEdge {
                parent: RoleId::new("user").unwrap(),
                child: RoleId::new("admin").unwrap(),
            },
            Change::DeleteRole {
                role: RoleId::new("admin").unwrap(),
            },
        ]
    );
}

#[test]
fn test_snapshot_round_trip_into_fresh_service() {
    let rbac = Rbac::new();
    for role in ["user", "editor", "admin"] {
        rbac.create_role(role).unwrap();
    }
    rbac.add_hierarchy("user", "editor").unwrap();
    rbac.add_hierarchy("user", "admin").unwrap();
    rbac.add_hierarchy("editor", "admin").unwrap();
    rbac.grant_permission("user", &perm("event", "*", "view")).unwrap();
    rbac.grant_permission("editor", &perm("event", "", "create")).unwrap();
    rbac.create_subject("Alex").unwrap();
    rbac.create_subject("Idle").unwrap();
    rbac.assign_role("Alex", "admin").unwrap();

    let snapshot = rbac.snapshot();
    let restored = Rbac::with_provider(Arc::new(MemoryStore::with_snapshot(snapshot))).unwrap();

    assert_eq!(restored.state(), rbac.state());
    assert_eq!(restored.list_subjects(), rbac.list_subjects());
    assert_eq!(
        restored.subject_permissions("Alex").unwrap(),
        rbac.subject_permissions("Alex").unwrap()
    );
}

#[test]
fn test_invalid_snapshot_rejected_on_load() {
    let mut snapshot = Snapshot::new();
    snapshot.roles.insert(
        RoleId::new("user").unwrap(),
        permgraph_rbac::RoleRecord {
            children: vec![RoleId::new("ghost").unwrap()],
            ..Default::default()
        },
    );
    let err = Rbac::with_provider(Arc::new(MemoryStore::with_snapshot(snapshot))).unwrap_err();
    assert_eq!(err, RbacError::NotFound("Role 'ghost' does not exist!".into()));
}

#[test]
fn test_concurrent_readers_never_see_cycles() {
    let rbac = Rbac::new();
    let roles: Vec<String> = (0..8).map(|i| format!("r{i}")).collect();
    for role in &roles {
        rbac.create_role(role).unwrap();
    }
    rbac.grant_permission("r0", &perm("doc", "*", "read")).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..50 {
                for pair in roles.windows(2) {
                    rbac.add_hierarchy(&pair[0], &pair[1]).unwrap();
                }
                assert!(matches!(
                    rbac.add_hierarchy(&roles[7], &roles[0]),
                    Err(RbacError::Cycle(_))
                ));
                for pair in roles.windows(2) {
                    rbac.remove_hierarchy(&pair[0], &pair[1]).unwrap();
                }
            }
        });

        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    for role in &roles {
                        let ancestors = rbac.role_ancestors(role).unwrap();
                        assert!(!ancestors.contains(role.as_str()));
                        rbac.check_role_permission(role, &perm("doc", "1", "read"))
                            .unwrap();
                    }
                }
            });
        }
    });

    assert!(rbac.role_children("r0").unwrap().is_empty());
}

#[test]
fn test_service_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Rbac>();
}
