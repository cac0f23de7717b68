use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use warden_core::{AuthClient, IdentityGraph, IdentityProvider, Role, Scope, Tenant, User};

/// Resolved authorization context for one `(subject, client_id)` pair
///
/// This is the exact value written to the cache. Every field is derived from
/// persistence, and `permissions` is a `BTreeSet` so the serialized bytes are
/// stable for identical store content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    pub user: User,
    pub tenant: Tenant,
    pub provider: IdentityProvider,
    pub client: AuthClient,

    /// Effective roles inside the tenant, ordered by id
    pub roles: Vec<Role>,

    /// Names of every permission granted through `roles`
    pub permissions: BTreeSet<String>,
}

impl IdentityContext {
    /// Combine a joined identity graph with its permission closure
    pub fn from_graph(graph: IdentityGraph, permissions: BTreeSet<String>) -> Self {
        Self {
            user: graph.user,
            tenant: graph.tenant,
            provider: graph.provider,
            client: graph.client,
            roles: graph.roles,
            permissions,
        }
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }

    /// Check role membership by role name
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }

    /// Tenant-wide scope of the user
    pub fn scope(&self) -> Scope {
        self.tenant.scope()
    }
}
