//! Permission reconciliation integration tests
//!
//! Runs the matcher against the in-memory store across tenant and container
//! scopes.

use std::sync::Arc;
use warden_authz::permission::{PermissionMatcher, ReconcileMode, RoleAssignments};
use warden_authz::store::MemoryStore;
use warden_authz::AuthzError;
use warden_core::{GrantStore, Permission, PermissionPattern, Role, Scope};

fn patterns(raw: &[&str]) -> Vec<PermissionPattern> {
    raw.iter().map(|p| PermissionPattern::parse(p).unwrap()).collect()
}

/// Two tenants with identically named catalogs plus one container of acme
async fn multi_tenant_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let acme = Scope::tenant("acme");
    let globex = Scope::tenant("globex");
    let billing = Scope::container("billing");
    store.insert_container("billing", "acme").await;

    for (scope, prefix) in [(&acme, "acme"), (&globex, "globex"), (&billing, "billing")] {
        for name in ["user:read", "user:write", "org:read"] {
            store
                .insert_permission(Permission::new(
                    format!("{}-{}", prefix, name),
                    scope.clone(),
                    name,
                ))
                .await;
        }
    }

    store.insert_role(Role::new("acme-admin", acme.clone(), "admin")).await;
    store.insert_role(Role::new("acme-viewer", acme, "viewer")).await;
    store.insert_role(Role::new("globex-admin", globex, "admin")).await;
    store.insert_role(Role::new("billing-admin", billing, "admin")).await;
    store
}

fn matcher(store: &Arc<MemoryStore>) -> PermissionMatcher {
    PermissionMatcher::new(store.clone(), store.clone())
}

async fn granted_ids(store: &MemoryStore, role_id: &str, scope: &Scope) -> Vec<String> {
    store
        .granted_permissions(role_id, scope)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect()
}

// ============================================================================
// Wildcard Correctness
// ============================================================================

#[tokio::test]
async fn test_wildcard_candidate_sets() {
    let store = multi_tenant_store().await;
    let m = matcher(&store);
    let acme = Scope::tenant("acme");

    let report = m
        .reconcile("acme-admin", &acme, &patterns(&["user:*"]), ReconcileMode::Additive)
        .await
        .unwrap();
    assert_eq!(
        report.candidates.into_iter().collect::<Vec<_>>(),
        vec!["user:read".to_string(), "user:write".to_string()]
    );

    let all = m.resolve_patterns(&acme, &patterns(&["*"])).await.unwrap();
    assert_eq!(all.len(), 3);

    let exact = m.resolve_patterns(&acme, &patterns(&["org:read"])).await.unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].id, "acme-org:read");
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_second_reconcile_performs_no_writes() {
    let store = multi_tenant_store().await;
    let m = matcher(&store);
    let acme = Scope::tenant("acme");
    let wanted = patterns(&["user:*", "org:read"]);

    let first = m.ensure_granted("acme-admin", &acme, &wanted).await.unwrap();
    assert_eq!(first.granted, 3);
    let writes_after_first = store.stats().grant_writes;
    let grants_after_first = granted_ids(&store, "acme-admin", &acme).await;

    let second = m.ensure_granted("acme-admin", &acme, &wanted).await.unwrap();
    assert_eq!(second.granted, 0);
    assert_eq!(second.unchanged, 3);
    assert_eq!(store.stats().grant_writes, writes_after_first);
    assert_eq!(granted_ids(&store, "acme-admin", &acme).await, grants_after_first);
}

#[tokio::test]
async fn test_replace_then_additive_converge_to_same_set() {
    let store = multi_tenant_store().await;
    let m = matcher(&store);
    let acme = Scope::tenant("acme");

    m.ensure_granted("acme-viewer", &acme, &patterns(&["*"])).await.unwrap();
    let report = m
        .replace_grants("acme-viewer", &acme, &patterns(&["user:read"]))
        .await
        .unwrap();

    assert_eq!(report.revoked, 2);
    assert_eq!(
        granted_ids(&store, "acme-viewer", &acme).await,
        vec!["acme-user:read"]
    );

    let again = m
        .replace_grants("acme-viewer", &acme, &patterns(&["user:read"]))
        .await
        .unwrap();
    assert!(again.is_noop());
}

// ============================================================================
// Scope Isolation
// ============================================================================

#[tokio::test]
async fn test_reconcile_never_crosses_tenants() {
    let store = multi_tenant_store().await;
    let m = matcher(&store);

    m.ensure_granted("acme-admin", &Scope::tenant("acme"), &patterns(&["*"]))
        .await
        .unwrap();

    let ids = granted_ids(&store, "acme-admin", &Scope::tenant("acme")).await;
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| id.starts_with("acme-")));
    assert!(granted_ids(&store, "globex-admin", &Scope::tenant("globex"))
        .await
        .is_empty());
}

#[tokio::test]
async fn test_container_scope_is_separate_from_tenant() {
    let store = multi_tenant_store().await;
    let m = matcher(&store);
    let billing = Scope::container("billing");

    let report = m
        .ensure_granted("billing-admin", &billing, &patterns(&["user:*"]))
        .await
        .unwrap();

    assert_eq!(report.granted, 2);
    let ids = granted_ids(&store, "billing-admin", &billing).await;
    assert_eq!(ids, vec!["billing-user:read", "billing-user:write"]);
}

#[tokio::test]
async fn test_role_from_other_scope_is_rejected() {
    let store = multi_tenant_store().await;
    let err = matcher(&store)
        .ensure_granted("globex-admin", &Scope::tenant("acme"), &patterns(&["*"]))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthzError::InvalidInput(_)));
    assert!(!err.is_retryable());
    assert_eq!(store.stats().grant_writes, 0);
}

// ============================================================================
// Provisioning
// ============================================================================

#[tokio::test]
async fn test_provision_reconciles_each_role() {
    let store = multi_tenant_store().await;
    let assignments = RoleAssignments::new()
        .with_role("admin", &["*"])
        .unwrap()
        .with_role("viewer", &["user:read", "org:read"])
        .unwrap()
        .with_role("auditor", &["org:*"])
        .unwrap();

    let report = matcher(&store)
        .provision(&Scope::tenant("acme"), &assignments, ReconcileMode::Additive)
        .await;

    assert!(!report.is_success());
    assert_eq!(report.failed_roles(), vec!["auditor"]);
    assert!(matches!(
        report.roles["auditor"],
        Err(AuthzError::RoleNotFound(ref r)) if r == "auditor"
    ));
    assert_eq!(report.roles["admin"].as_ref().unwrap().granted, 3);
    assert_eq!(report.roles["viewer"].as_ref().unwrap().granted, 2);
    assert_eq!(report.total_granted(), 5);
}

#[tokio::test]
async fn test_provision_is_idempotent() {
    let store = multi_tenant_store().await;
    let assignments = RoleAssignments::new()
        .with_role("admin", &["*"])
        .unwrap()
        .with_role("viewer", &["user:read"])
        .unwrap();
    let m = matcher(&store);
    let globex = Scope::tenant("globex");

    let first = m.provision(&globex, &assignments, ReconcileMode::Replace).await;
    assert!(!first.is_success()); // globex has no viewer role
    assert_eq!(first.total_granted(), 3);

    let writes = store.stats().grant_writes;
    let second = m.provision(&globex, &assignments, ReconcileMode::Replace).await;
    assert_eq!(second.total_granted(), 0);
    assert_eq!(store.stats().grant_writes, writes);
}
