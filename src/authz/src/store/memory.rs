//! In-memory persistence adapter
//!
//! Implements every persistence collaborator trait over a single
//! `RwLock`-guarded state. Used by tests and single-process deployments.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use warden_core::{
    AuthClient, GrantOutcome, GrantStore, GrantTransaction, IdentityGraph, IdentityProvider,
    IdentityStore, Permission, PermissionCatalog, PermissionPattern, Role, Scope, StoreError,
    Tenant, User,
};

#[derive(Default)]
struct State {
    tenants: HashMap<String, Tenant>,
    /// container id -> owning tenant id
    containers: HashMap<String, String>,
    users: HashMap<String, User>,
    providers: HashMap<String, IdentityProvider>,
    clients: HashMap<String, AuthClient>,
    /// (subject, client_id) -> user id
    identities: HashMap<(String, String), String>,
    permissions: HashMap<String, Permission>,
    roles: HashMap<String, Role>,
    /// user id -> role ids
    user_roles: HashMap<String, BTreeSet<String>>,
    /// role id -> permission ids
    grants: HashMap<String, BTreeSet<String>>,
}

impl State {
    fn scope_belongs_to_tenant(&self, scope: &Scope, tenant_id: &str) -> bool {
        match scope {
            Scope::Tenant(id) => id == tenant_id,
            Scope::Container(id) => {
                self.containers.get(id).map(String::as_str) == Some(tenant_id)
            }
        }
    }

    fn is_granted(&self, role_id: &str, permission_id: &str) -> bool {
        self.grants
            .get(role_id)
            .map(|granted| granted.contains(permission_id))
            .unwrap_or(false)
    }
}

#[derive(Default)]
struct Counters {
    catalog_reads: AtomicU64,
    identity_reads: AtomicU64,
    grant_reads: AtomicU64,
    grant_writes: AtomicU64,
}

/// Access counters exposed for tests and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Catalog lookups served
    pub catalog_reads: u64,
    /// Identity-graph lookups served
    pub identity_reads: u64,
    /// Granted-permission enumerations served
    pub grant_reads: u64,
    /// Grant rows created or removed by committed transactions
    pub grant_writes: u64,
}

/// In-memory persistence adapter
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the access counters
    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            catalog_reads: self.counters.catalog_reads.load(Ordering::Relaxed),
            identity_reads: self.counters.identity_reads.load(Ordering::Relaxed),
            grant_reads: self.counters.grant_reads.load(Ordering::Relaxed),
            grant_writes: self.counters.grant_writes.load(Ordering::Relaxed),
        }
    }

    pub async fn insert_tenant(&self, tenant: Tenant) {
        let mut state = self.state.write().await;
        state.tenants.insert(tenant.id.clone(), tenant);
    }

    /// Register a container under a tenant
    pub async fn insert_container(
        &self,
        container_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) {
        let mut state = self.state.write().await;
        state.containers.insert(container_id.into(), tenant_id.into());
    }

    pub async fn insert_user(&self, user: User) {
        let mut state = self.state.write().await;
        state.users.insert(user.id.clone(), user);
    }

    pub async fn insert_provider(&self, provider: IdentityProvider) {
        let mut state = self.state.write().await;
        state.providers.insert(provider.id.clone(), provider);
    }

    pub async fn insert_client(&self, client: AuthClient) {
        let mut state = self.state.write().await;
        state.clients.insert(client.client_id.clone(), client);
    }

    /// Link an external subject, as seen by one client, to a user
    pub async fn link_identity(
        &self,
        subject: impl Into<String>,
        client_id: impl Into<String>,
        user_id: impl Into<String>,
    ) {
        let mut state = self.state.write().await;
        state
            .identities
            .insert((subject.into(), client_id.into()), user_id.into());
    }

    pub async fn insert_permission(&self, permission: Permission) {
        let mut state = self.state.write().await;
        state.permissions.insert(permission.id.clone(), permission);
    }

    pub async fn insert_role(&self, role: Role) {
        let mut state = self.state.write().await;
        state.roles.insert(role.id.clone(), role);
    }

    /// Make a user a member of a role
    pub async fn assign_role(&self, user_id: impl Into<String>, role_id: impl Into<String>) {
        let mut state = self.state.write().await;
        state
            .user_roles
            .entry(user_id.into())
            .or_default()
            .insert(role_id.into());
    }

    /// Seed a grant directly, bypassing transactions and write counters
    pub async fn seed_grant(&self, role_id: impl Into<String>, permission_id: impl Into<String>) {
        let mut state = self.state.write().await;
        state
            .grants
            .entry(role_id.into())
            .or_default()
            .insert(permission_id.into());
    }

    /// Rename a user in place (simulates an out-of-band profile edit)
    pub async fn rename_user(&self, user_id: &str, username: impl Into<String>) {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(user_id) {
            user.username = username.into();
        }
    }
}

#[async_trait]
impl PermissionCatalog for MemoryStore {
    async fn find_permissions(
        &self,
        scope: &Scope,
        pattern: &PermissionPattern,
    ) -> Result<Vec<Permission>, StoreError> {
        self.counters.catalog_reads.fetch_add(1, Ordering::Relaxed);

        let state = self.state.read().await;
        let mut matching: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| &p.scope == scope && pattern.matches(&p.name))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(matching)
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn find_role(&self, scope: &Scope, name: &str) -> Result<Option<Role>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .find(|r| &r.scope == scope && r.name == name)
            .cloned())
    }

    async fn find_role_by_id(&self, role_id: &str) -> Result<Option<Role>, StoreError> {
        let state = self.state.read().await;
        Ok(state.roles.get(role_id).cloned())
    }

    async fn granted_permissions(
        &self,
        role_id: &str,
        scope: &Scope,
    ) -> Result<Vec<Permission>, StoreError> {
        self.counters.grant_reads.fetch_add(1, Ordering::Relaxed);

        let state = self.state.read().await;
        let Some(granted) = state.grants.get(role_id) else {
            return Ok(Vec::new());
        };

        let mut permissions: Vec<Permission> = granted
            .iter()
            .filter_map(|id| state.permissions.get(id))
            .filter(|p| &p.scope == scope)
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(permissions)
    }

    async fn permissions_for_roles(
        &self,
        role_ids: &[String],
    ) -> Result<Vec<Permission>, StoreError> {
        self.counters.grant_reads.fetch_add(1, Ordering::Relaxed);

        let state = self.state.read().await;
        let mut closure: HashMap<&str, &Permission> = HashMap::new();
        for role in role_ids.iter().filter_map(|id| state.roles.get(id)) {
            let granted = state.grants.get(&role.id).into_iter().flatten();
            for permission in granted.filter_map(|id| state.permissions.get(id)) {
                if permission.scope == role.scope {
                    closure.insert(permission.id.as_str(), permission);
                }
            }
        }

        let mut permissions: Vec<Permission> = closure.into_values().cloned().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(permissions)
    }

    async fn begin_grants(
        &self,
        role_id: &str,
        scope: &Scope,
    ) -> Result<Box<dyn GrantTransaction>, StoreError> {
        let state = self.state.read().await;
        match state.roles.get(role_id) {
            Some(role) if &role.scope == scope => {}
            Some(role) => {
                return Err(StoreError::ScopeMismatch(format!(
                    "role '{}' belongs to {}, not {}",
                    role_id, role.scope, scope
                )))
            }
            None => {
                return Err(StoreError::query(format!(
                    "role '{}' does not exist",
                    role_id
                )))
            }
        }
        drop(state);

        Ok(Box::new(MemoryGrantTransaction {
            state: self.state.clone(),
            counters: self.counters.clone(),
            role_id: role_id.to_string(),
            scope: scope.clone(),
            pending_grants: BTreeSet::new(),
            pending_revokes: BTreeSet::new(),
        }))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity(
        &self,
        subject: &str,
        client_id: &str,
    ) -> Result<Option<IdentityGraph>, StoreError> {
        self.counters.identity_reads.fetch_add(1, Ordering::Relaxed);

        let state = self.state.read().await;

        let key = (subject.to_string(), client_id.to_string());
        let Some(user) = state.identities.get(&key).and_then(|id| state.users.get(id)) else {
            return Ok(None);
        };
        let Some(client) = state.clients.get(client_id) else {
            return Ok(None);
        };
        let Some(provider) = state.providers.get(&client.provider_id) else {
            return Ok(None);
        };
        let Some(tenant) = state.tenants.get(&user.tenant_id) else {
            return Ok(None);
        };

        // Every joined row must belong to the user's tenant
        if client.tenant_id != tenant.id || provider.tenant_id != tenant.id {
            return Ok(None);
        }
        if !user.enabled || !tenant.enabled {
            return Ok(None);
        }

        let mut roles: Vec<Role> = state
            .user_roles
            .get(&user.id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.roles.get(id))
            .filter(|role| state.scope_belongs_to_tenant(&role.scope, &tenant.id))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Some(IdentityGraph {
            user: user.clone(),
            tenant: tenant.clone(),
            provider: provider.clone(),
            client: client.clone(),
            roles,
        }))
    }
}

/// Buffered grant writes applied atomically on commit
struct MemoryGrantTransaction {
    state: Arc<RwLock<State>>,
    counters: Arc<Counters>,
    role_id: String,
    scope: Scope,
    pending_grants: BTreeSet<String>,
    pending_revokes: BTreeSet<String>,
}

#[async_trait]
impl GrantTransaction for MemoryGrantTransaction {
    async fn grant(&mut self, permission_id: &str) -> Result<GrantOutcome, StoreError> {
        let state = self.state.read().await;

        let permission = state.permissions.get(permission_id).ok_or_else(|| {
            StoreError::query(format!("permission '{}' does not exist", permission_id))
        })?;
        if permission.scope != self.scope {
            return Err(StoreError::ScopeMismatch(format!(
                "permission '{}' belongs to {}, not {}",
                permission_id, permission.scope, self.scope
            )));
        }

        let already = (state.is_granted(&self.role_id, permission_id)
            && !self.pending_revokes.contains(permission_id))
            || self.pending_grants.contains(permission_id);
        if already {
            return Ok(GrantOutcome::AlreadyGranted);
        }

        self.pending_revokes.remove(permission_id);
        self.pending_grants.insert(permission_id.to_string());
        Ok(GrantOutcome::Created)
    }

    async fn revoke(&mut self, permission_id: &str) -> Result<bool, StoreError> {
        let state = self.state.read().await;

        if self.pending_grants.remove(permission_id) {
            return Ok(true);
        }
        if state.is_granted(&self.role_id, permission_id)
            && self.pending_revokes.insert(permission_id.to_string())
        {
            return Ok(true);
        }
        Ok(false)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let granted = state.grants.entry(self.role_id.clone()).or_default();

        let mut writes = 0;
        for permission_id in &self.pending_revokes {
            if granted.remove(permission_id) {
                writes += 1;
            }
        }
        for permission_id in &self.pending_grants {
            if granted.insert(permission_id.clone()) {
                writes += 1;
            }
        }

        self.counters.grant_writes.fetch_add(writes, Ordering::Relaxed);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
