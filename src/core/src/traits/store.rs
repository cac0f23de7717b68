//! Persistence collaborator traits
//!
//! Every lookup distinguishes absence (`Ok(None)` / empty `Vec`) from failure
//! (`Err(StoreError)`); the engine's control flow depends on it.

use crate::error::StoreError;
use crate::types::{GrantOutcome, IdentityGraph, Permission, PermissionPattern, Role, Scope};
use async_trait::async_trait;

/// Permission catalog lookup
#[async_trait]
pub trait PermissionCatalog: Send + Sync {
    /// List catalog entries in `scope` whose name matches `pattern`
    ///
    /// Implementations must never return a permission from another scope.
    async fn find_permissions(
        &self,
        scope: &Scope,
        pattern: &PermissionPattern,
    ) -> Result<Vec<Permission>, StoreError>;
}

/// Role lookup and role → permission grants
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Find a role by name inside a scope
    async fn find_role(&self, scope: &Scope, name: &str) -> Result<Option<Role>, StoreError>;

    /// Find a role by id, whatever its scope
    async fn find_role_by_id(&self, role_id: &str) -> Result<Option<Role>, StoreError>;

    /// Enumerate the permissions currently granted to a role
    async fn granted_permissions(
        &self,
        role_id: &str,
        scope: &Scope,
    ) -> Result<Vec<Permission>, StoreError>;

    /// Permissions granted to any of `role_ids`, in one lookup
    ///
    /// Each grant only counts when the permission shares its role's scope.
    /// A permission granted through several roles is returned once.
    async fn permissions_for_roles(
        &self,
        role_ids: &[String],
    ) -> Result<Vec<Permission>, StoreError>;

    /// Open the transactional boundary for one role's reconciliation pass
    async fn begin_grants(
        &self,
        role_id: &str,
        scope: &Scope,
    ) -> Result<Box<dyn GrantTransaction>, StoreError>;
}

/// Grant writes for a single role, committed atomically
///
/// A failed `grant`/`revoke` must leave the transaction usable so the caller
/// can skip the offending row and continue.
#[async_trait]
pub trait GrantTransaction: Send {
    /// Idempotently create the `(role, permission)` grant
    async fn grant(&mut self, permission_id: &str) -> Result<GrantOutcome, StoreError>;

    /// Remove the `(role, permission)` grant; `false` if it did not exist
    async fn revoke(&mut self, permission_id: &str) -> Result<bool, StoreError>;

    /// Make all successful writes visible
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all writes
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Joined identity-graph lookup
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve user → client → provider → tenant for a `(subject, client_id)` pair
    ///
    /// `Ok(None)` when no identity row links the subject to the client, or when
    /// the joined rows do not belong to the same tenant.
    async fn find_identity(
        &self,
        subject: &str,
        client_id: &str,
    ) -> Result<Option<IdentityGraph>, StoreError>;
}
