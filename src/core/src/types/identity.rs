//! Identity graph entities
//!
//! These mirror the relational rows joined when resolving a request's
//! identity context. They are plain data; the persistence collaborator owns
//! their lifecycle.

use serde::{Deserialize, Serialize};

use super::permission::Role;
use super::scope::Scope;

/// Tenant (top-level isolation boundary)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: String,

    /// Tenant display name
    pub name: String,

    /// Whether the tenant may authenticate users
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Tenant {
    /// Create a new enabled tenant
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
        }
    }

    /// Tenant-wide scope
    pub fn scope(&self) -> Scope {
        Scope::tenant(self.id.clone())
    }
}

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Login name
    pub username: String,

    /// Primary email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Whether the account is active
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl User {
    /// Create a new enabled user
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            username: username.into(),
            email: None,
            display_name: None,
            enabled: true,
        }
    }

    /// Add an email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Upstream identity provider (OIDC issuer, SAML IdP, local directory, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProvider {
    /// Unique provider identifier
    pub id: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Provider kind (e.g., "oidc", "saml", "local")
    pub kind: String,

    /// Issuer identifier
    pub issuer: String,
}

impl IdentityProvider {
    /// Create a new provider
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        kind: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            kind: kind.into(),
            issuer: issuer.into(),
        }
    }
}

/// OAuth client registered with a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClient {
    /// Client identifier presented by callers
    pub client_id: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Provider that authenticates users for this client
    pub provider_id: String,

    /// Client display name
    pub name: String,
}

impl AuthClient {
    /// Create a new client
    pub fn new(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        provider_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            provider_id: provider_id.into(),
            name: name.into(),
        }
    }
}

/// Result of the joined identity lookup for one `(subject, client_id)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityGraph {
    pub user: User,
    pub tenant: Tenant,
    pub provider: IdentityProvider,
    pub client: AuthClient,

    /// Roles assigned to the user inside the tenant
    #[serde(default)]
    pub roles: Vec<Role>,
}

fn default_true() -> bool {
    true
}
