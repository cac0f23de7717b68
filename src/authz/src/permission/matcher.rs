use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use warden_core::{
    GrantOutcome, GrantStore, Permission, PermissionCatalog, PermissionPattern, Scope, StoreError,
};

use super::{GrantFailure, ProvisionReport, ReconcileMode, ReconcileReport, RoleAssignments};
use crate::error::{AuthzError, Result};

/// Default number of whole-pass attempts when the grant commit fails
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Resolves permission patterns and reconciles role grant sets
pub struct PermissionMatcher {
    /// Permission catalog lookups
    catalog: Arc<dyn PermissionCatalog>,

    /// Grant enumeration and writes
    grants: Arc<dyn GrantStore>,

    /// Whole-pass attempts before giving up on a failing commit
    max_attempts: u32,
}

impl PermissionMatcher {
    /// Create a matcher over a catalog and a grant store
    pub fn new(catalog: Arc<dyn PermissionCatalog>, grants: Arc<dyn GrantStore>) -> Self {
        Self {
            catalog,
            grants,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the number of whole-pass attempts (at least one)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Resolve patterns to the candidate permission set of a scope
    ///
    /// Overlapping patterns collapse to one entry per permission. Performs no
    /// writes. Any catalog failure fails the whole resolution.
    pub async fn resolve_patterns(
        &self,
        scope: &Scope,
        patterns: &[PermissionPattern],
    ) -> Result<Vec<Permission>> {
        Ok(self.candidates(scope, patterns).await?.into_values().collect())
    }

    /// Additive reconciliation: grant every candidate, revoke nothing
    pub async fn ensure_granted(
        &self,
        role_id: &str,
        scope: &Scope,
        patterns: &[PermissionPattern],
    ) -> Result<ReconcileReport> {
        self.reconcile(role_id, scope, patterns, ReconcileMode::Additive).await
    }

    /// Destructive reconciliation: the grant set becomes exactly the candidate set
    pub async fn replace_grants(
        &self,
        role_id: &str,
        scope: &Scope,
        patterns: &[PermissionPattern],
    ) -> Result<ReconcileReport> {
        self.reconcile(role_id, scope, patterns, ReconcileMode::Replace).await
    }

    /// Converge a role's grants in `scope` toward the patterns' matches
    ///
    /// `report.granted` counts newly created grants. A converged role performs
    /// zero writes. If the commit fails the pass is retried from a fresh diff,
    /// up to the configured attempt count.
    ///
    /// An unknown `role_id` is `RoleNotFound` and a role defined in another
    /// scope is `InvalidInput`, whatever the candidate set.
    pub async fn reconcile(
        &self,
        role_id: &str,
        scope: &Scope,
        patterns: &[PermissionPattern],
        mode: ReconcileMode,
    ) -> Result<ReconcileReport> {
        let role = self
            .grants
            .find_role_by_id(role_id)
            .await
            .map_err(AuthzError::StoreUnavailable)?
            .ok_or_else(|| AuthzError::RoleNotFound(role_id.to_string()))?;

        if &role.scope != scope {
            warn!(role = role_id, role_scope = %role.scope, scope = %scope, "Role outside scope");
            return Err(AuthzError::InvalidInput(format!(
                "role '{}' belongs to {}, not {}",
                role_id, role.scope, scope
            )));
        }

        self.converge(role_id, scope, patterns, mode).await
    }

    /// Reconcile every role of an assignment table concurrently
    ///
    /// Each role reports its own outcome; one failing role does not stop the others.
    pub async fn provision(
        &self,
        scope: &Scope,
        assignments: &RoleAssignments,
        mode: ReconcileMode,
    ) -> ProvisionReport {
        let passes = assignments.iter().map(|(role_name, patterns)| async move {
            let outcome = match self.grants.find_role(scope, role_name).await {
                Ok(Some(role)) => self.converge(&role.id, scope, patterns, mode).await,
                Ok(None) => {
                    warn!(role = %role_name, scope = %scope, "Role not defined in scope");
                    Err(AuthzError::RoleNotFound(role_name.clone()))
                }
                Err(e) => Err(AuthzError::StoreUnavailable(e)),
            };
            (role_name.clone(), outcome)
        });

        let report = ProvisionReport {
            roles: join_all(passes).await.into_iter().collect(),
        };
        info!(
            scope = %scope,
            roles = report.roles.len(),
            granted = report.total_granted(),
            failed = report.failed_roles().len(),
            "Provisioning complete"
        );
        report
    }

    /// Retry loop around `run_pass` for a role already known to be in `scope`
    async fn converge(
        &self,
        role_id: &str,
        scope: &Scope,
        patterns: &[PermissionPattern],
        mode: ReconcileMode,
    ) -> Result<ReconcileReport> {
        let span = info_span!(
            "reconcile",
            pass_id = %Uuid::new_v4(),
            role = role_id,
            scope = %scope,
            mode = %mode,
        );

        async move {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match self.run_pass(role_id, scope, patterns, mode).await {
                    Ok(report) => return Ok(report),
                    Err(PassError::Commit(e)) if attempt < self.max_attempts => {
                        warn!(attempt, error = %e, "Grant commit failed, retrying pass");
                    }
                    Err(PassError::Commit(e)) => {
                        warn!(attempt, error = %e, "Grant commit failed, giving up");
                        return Err(AuthzError::GrantCommitFailed {
                            role: role_id.to_string(),
                            source: e,
                        });
                    }
                    Err(PassError::Abort(e)) => return Err(e),
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Candidate set keyed by permission name
    async fn candidates(
        &self,
        scope: &Scope,
        patterns: &[PermissionPattern],
    ) -> Result<BTreeMap<String, Permission>> {
        let mut candidates = BTreeMap::new();

        for pattern in patterns {
            let found = self
                .catalog
                .find_permissions(scope, pattern)
                .await
                .map_err(|source| AuthzError::CatalogLookupFailed {
                    pattern: pattern.to_string(),
                    source,
                })?;

            debug!(pattern = %pattern, matched = found.len(), "Pattern resolved");
            for permission in found {
                // Guard against an adapter leaking rows from another scope
                if &permission.scope == scope && pattern.matches(&permission.name) {
                    candidates.insert(permission.name.clone(), permission);
                }
            }
        }

        Ok(candidates)
    }

    async fn run_pass(
        &self,
        role_id: &str,
        scope: &Scope,
        patterns: &[PermissionPattern],
        mode: ReconcileMode,
    ) -> std::result::Result<ReconcileReport, PassError> {
        let candidates = self.candidates(scope, patterns).await?;
        let granted = self
            .grants
            .granted_permissions(role_id, scope)
            .await
            .map_err(AuthzError::StoreUnavailable)?;

        let granted_ids: BTreeSet<&str> = granted.iter().map(|p| p.id.as_str()).collect();
        let candidate_ids: BTreeSet<&str> =
            candidates.values().map(|p| p.id.as_str()).collect();

        let to_grant: Vec<&Permission> = candidates
            .values()
            .filter(|p| !granted_ids.contains(p.id.as_str()))
            .collect();
        let to_revoke: Vec<&Permission> = match mode {
            ReconcileMode::Additive => Vec::new(),
            ReconcileMode::Replace => granted
                .iter()
                .filter(|p| !candidate_ids.contains(p.id.as_str()))
                .collect(),
        };

        let mut report = ReconcileReport {
            unchanged: candidates.len() - to_grant.len(),
            candidates: candidates.keys().cloned().collect(),
            ..Default::default()
        };

        if to_grant.is_empty() && to_revoke.is_empty() {
            debug!(candidates = candidates.len(), "Role already converged");
            return Ok(report);
        }

        let mut tx = self
            .grants
            .begin_grants(role_id, scope)
            .await
            .map_err(|e| match e {
                StoreError::ScopeMismatch(reason) => AuthzError::InvalidInput(reason),
                other => AuthzError::StoreUnavailable(other),
            })?;

        for permission in to_grant {
            match tx.grant(&permission.id).await {
                Ok(GrantOutcome::Created) => report.granted += 1,
                Ok(GrantOutcome::AlreadyGranted) => report.unchanged += 1,
                Err(e) => {
                    warn!(
                        permission = %permission.name,
                        error = %e,
                        "Grant write failed, skipping"
                    );
                    report.failures.push(GrantFailure {
                        permission: permission.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        for permission in to_revoke {
            match tx.revoke(&permission.id).await {
                Ok(true) => report.revoked += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(permission = %permission.name, error = %e, "Revoke failed, skipping");
                    report.failures.push(GrantFailure {
                        permission: permission.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tx.commit().await.map_err(PassError::Commit)?;

        info!(
            granted = report.granted,
            revoked = report.revoked,
            unchanged = report.unchanged,
            failures = report.failures.len(),
            "Role reconciled"
        );
        Ok(report)
    }
}

/// Why a single pass stopped
enum PassError {
    /// Commit failed; the whole pass may be retried
    Commit(StoreError),
    /// Hard failure; no retry
    Abort(AuthzError),
}

impl From<AuthzError> for PassError {
    fn from(err: AuthzError) -> Self {
        PassError::Abort(err)
    }
}
