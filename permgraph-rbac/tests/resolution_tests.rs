//! End-to-end tests for permission resolution through the `Rbac` service.
//!
//! Scenarios:
//! 1. The event calendar: `user` views, `admin` edits and inherits from `user`
//! 2. Diamond inheritance: deduplicated permissions, per-origin policies
//! 3. Cycle rejection and non-cascading edge removal
//! 4. Idempotent administration
//! 5. Role deletion cascade

use permgraph_rbac::{ErrorKind, Permission, Policy, Rbac, RbacError, RoleId};
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test output, filtered by `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn perm(resource_type: &str, resource_id: &str, action: &str) -> Permission {
    Permission::new(resource_type, resource_id, action).unwrap()
}

/// Test fixture for the event calendar scenario.
fn calendar() -> Rbac {
    init_tracing();
    let rbac = Rbac::new();
    rbac.create_role("user").unwrap();
    rbac.create_role("admin").unwrap();
    rbac.grant_permission("user", &perm("event", "*", "view")).unwrap();
    rbac.grant_permission("admin", &perm("event", "*", "edit")).unwrap();
    rbac.add_hierarchy("user", "admin").unwrap();

    rbac.create_subject("Alex").unwrap();
    rbac.create_subject("Ursula").unwrap();
    rbac.assign_role("Alex", "admin").unwrap();
    rbac.assign_role("Ursula", "user").unwrap();
    rbac
}

#[test]
fn test_event_calendar_scenario() {
    let rbac = calendar();

    assert!(rbac.check_permission("Alex", &perm("event", "5", "edit")).unwrap());
    assert!(rbac.check_permission("Alex", &perm("event", "5", "view")).unwrap());
    assert!(!rbac.check_permission("Ursula", &perm("event", "5", "edit")).unwrap());
    assert!(rbac.check_permission("Ursula", &perm("event", "5", "view")).unwrap());

    let err = rbac
        .assert_permission("Ursula", &perm("event", "5", "edit"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.error_code(), "PERMISSION_DENIED");
    assert_eq!(
        err.to_string(),
        "Permission 'event[5]:edit' is not granted for Subject 'Ursula'!"
    );

    rbac.assert_permission("Alex", &perm("event", "5", "edit")).unwrap();
}

#[test]
fn test_inherited_vs_direct() {
    let rbac = calendar();
    let direct = rbac.role_permissions("admin", false).unwrap();
    let inherited = rbac.role_permissions("admin", true).unwrap();

    assert!(!direct.contains(&perm("event", "*", "view")));
    assert!(inherited.contains(&perm("event", "*", "view")));
    assert_eq!(inherited.len(), 2);

    let actions = rbac
        .subject_actions_on_resource("Alex", "event", "12", true)
        .unwrap();
    assert_eq!(actions.into_iter().collect::<Vec<_>>(), vec!["edit", "view"]);
    let actions = rbac
        .subject_actions_on_resource("Alex", "event", "12", false)
        .unwrap();
    assert_eq!(actions.into_iter().collect::<Vec<_>>(), vec!["edit"]);
}

#[test]
fn test_wildcard_request_not_matched_by_specific_grant() {
    let rbac = Rbac::new();
    rbac.create_role("owner").unwrap();
    rbac.grant_permission("owner", &perm("event", "19", "edit")).unwrap();

    assert!(rbac.check_role_permission("owner", &perm("event", "19", "edit")).unwrap());
    assert!(!rbac.check_role_permission("owner", &perm("event", "*", "edit")).unwrap());
    assert_eq!(
        rbac.assert_role_permission("owner", &perm("event", "20", "edit"))
            .unwrap_err()
            .to_string(),
        "Permission 'event[20]:edit' is not granted for Role 'owner'!"
    );
}

#[test]
fn test_diamond_dedup_keeps_origins() {
    let rbac = Rbac::new();
    for role in ["p1", "p2", "c"] {
        rbac.create_role(role).unwrap();
    }
    rbac.add_hierarchy("p1", "c").unwrap();
    rbac.add_hierarchy("p2", "c").unwrap();
    rbac.grant_permission("p1", &perm("report", "*", "read")).unwrap();
    rbac.grant_permission("p2", &perm("report", "*", "read")).unwrap();

    let permissions = rbac.role_permissions("c", true).unwrap();
    assert_eq!(permissions.len(), 1);

    let policies = rbac.role_policies("c", true).unwrap();
    assert_eq!(policies.len(), 2);
    assert!(policies.contains(&Policy::new(
        RoleId::new("p1").unwrap(),
        perm("report", "*", "read")
    )));
    assert!(policies.contains(&Policy::new(
        RoleId::new("p2").unwrap(),
        perm("report", "*", "read")
    )));
}

#[test]
fn test_cycle_rejected_and_state_unchanged() {
    let rbac = Rbac::new();
    rbac.create_role("a").unwrap();
    rbac.create_role("b").unwrap();
    rbac.add_hierarchy("a", "b").unwrap();

    let before = rbac.state();
    let err = rbac.add_hierarchy("b", "a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);
    assert_eq!(err.to_string(), "Desired hierarchy would create a cycle!");
    assert!(matches!(rbac.add_hierarchy("a", "a"), Err(RbacError::Cycle(_))));

    assert_eq!(rbac.state(), before);
    assert!(rbac.role_descendants("a").unwrap().contains("b"));
    assert!(rbac.role_ancestors("a").unwrap().is_empty());
}

#[test]
fn test_edge_removal_does_not_cascade() {
    let rbac = Rbac::new();
    for role in ["a", "b", "c"] {
        rbac.create_role(role).unwrap();
    }
    rbac.add_hierarchy("a", "b").unwrap();
    rbac.add_hierarchy("b", "c").unwrap();
    rbac.grant_permission("a", &perm("doc", "*", "read")).unwrap();
    assert!(rbac.check_role_permission("c", &perm("doc", "1", "read")).unwrap());

    rbac.remove_hierarchy("a", "b").unwrap();

    assert!(rbac.role_children("b").unwrap().contains("c"));
    assert!(!rbac.role_children("a").unwrap().contains("c"));
    assert!(!rbac.check_role_permission("c", &perm("doc", "1", "read")).unwrap());

    // Removing an absent edge between known roles is a no-op
    rbac.remove_hierarchy("a", "b").unwrap();
    assert!(matches!(
        rbac.remove_hierarchy("a", "zzz"),
        Err(RbacError::NotFound(_))
    ));
}

#[test]
fn test_edge_removal_keeps_other_paths() {
    let rbac = Rbac::new();
    for role in ["a", "b", "c"] {
        rbac.create_role(role).unwrap();
    }
    rbac.add_hierarchy("a", "c").unwrap();
    rbac.add_hierarchy("c", "b").unwrap();
    rbac.add_hierarchy("a", "b").unwrap();

    rbac.remove_hierarchy("a", "b").unwrap();
    assert!(rbac.role_ancestors("b").unwrap().contains("a"));
}

#[test]
fn test_idempotent_administration() {
    let rbac = calendar();
    let before = rbac.state();

    rbac.grant_permission("user", &perm("event", "*", "view")).unwrap();
    rbac.assign_role("Ursula", "user").unwrap();
    rbac.add_hierarchy("user", "admin").unwrap();
    rbac.revoke_permission("user", &perm("event", "*", "delete")).unwrap();
    rbac.deassign_role("Ursula", "admin").unwrap();

    assert_eq!(rbac.state(), before);
}

#[test]
fn test_unknown_and_invalid_arguments() {
    let rbac = calendar();

    assert_eq!(
        rbac.check_permission("Bob", &perm("event", "1", "view")).unwrap_err(),
        RbacError::NotFound("Subject 'Bob' does not exist!".into())
    );
    assert_eq!(
        rbac.create_role("user").unwrap_err().kind(),
        ErrorKind::AlreadyExists
    );
    assert_eq!(rbac.create_subject("").unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(
        rbac.add_hierarchy("x", "y").unwrap_err().to_string(),
        "Roles 'x' and 'y' do not exist!"
    );
    assert_eq!(
        rbac.subject_actions_on_resource("Alex", "", "1", true)
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidArgument
    );
}

#[test]
fn test_delete_role_cascades_without_relinking() {
    let rbac = Rbac::new();
    for role in ["base", "mid", "top"] {
        rbac.create_role(role).unwrap();
    }
    rbac.add_hierarchy("base", "mid").unwrap();
    rbac.add_hierarchy("mid", "top").unwrap();
    rbac.grant_permission("base", &perm("doc", "*", "read")).unwrap();
    rbac.grant_permission("mid", &perm("doc", "*", "write")).unwrap();
    rbac.create_subject("Mo").unwrap();
    rbac.assign_role("Mo", "mid").unwrap();

    rbac.delete_role("mid").unwrap();

    assert!(!rbac.list_roles().contains("mid"));
    assert!(rbac.subject_roles("Mo", true).unwrap().is_empty());
    assert!(rbac.role_parents("top").unwrap().is_empty());
    assert!(rbac.role_children("base").unwrap().is_empty());
    assert!(!rbac.check_role_permission("top", &perm("doc", "1", "read")).unwrap());

    // re-creating the role starts from scratch
    rbac.create_role("mid").unwrap();
    assert!(rbac.role_permissions("mid", true).unwrap().is_empty());
    assert!(rbac.role_subjects("mid", true).unwrap().is_empty());
}

#[test]
fn test_delete_subject() {
    let rbac = calendar();
    rbac.delete_subject("Alex").unwrap();
    assert!(!rbac.list_subjects().contains("Alex"));
    assert!(!rbac.role_subjects("admin", false).unwrap().contains("Alex"));
    assert_eq!(
        rbac.delete_subject("Alex").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_role_subjects_include_descendants() {
    let rbac = calendar();
    let direct = rbac.role_subjects("user", false).unwrap();
    assert_eq!(direct.len(), 1);
    let all = rbac.role_subjects("user", true).unwrap();
    assert!(all.contains("Alex"));
    assert!(all.contains("Ursula"));
}

#[test]
fn test_role_dag_export() {
    let rbac = calendar();
    let dag = rbac.role_dag(Some(&["admin"]), true, true).unwrap();
    assert_eq!(dag.roles.len(), 2);
    assert_eq!(dag.hierarchy.len(), 1);
    assert_eq!(dag.subjects.len(), 2);
    assert_eq!(dag.permissions.len(), 2);

    let dag = rbac.role_dag(Some(&["user"]), false, false).unwrap();
    assert_eq!(dag.roles.len(), 1);
    assert!(dag.hierarchy.is_empty());
    assert!(dag.to_dot().contains("\"role:user\""));
}
