//! Wildcard permission-to-role reconciliation
//!
//! Converges a role's grant set toward the union of a list of permission
//! patterns, resolved against the permission catalog of one scope.
//!
//! # Features
//!
//! - **Pattern Matching**: exact names, `prefix*` and the universal `*`
//! - **Two Policies**: [`ReconcileMode::Additive`] only adds grants,
//!   [`ReconcileMode::Replace`] also revokes grants outside the candidate set
//! - **Idempotent**: a converged role is left alone and no transaction is opened
//! - **Partial-Failure Tolerant**: one bad grant row is logged and skipped;
//!   a catalog failure aborts the pass before any write
//! - **Atomic per Role**: every write of a pass commits together or the pass
//!   is retried from a fresh diff
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use warden_authz::permission::{PermissionMatcher, ReconcileMode};
//! use warden_authz::store::MemoryStore;
//! use warden_core::{Permission, PermissionPattern, Role, Scope};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let acme = Scope::tenant("acme");
//! store.insert_permission(Permission::new("p1", acme.clone(), "user:read")).await;
//! store.insert_permission(Permission::new("p2", acme.clone(), "user:write")).await;
//! store.insert_role(Role::new("admin", acme.clone(), "admin")).await;
//!
//! let matcher = PermissionMatcher::new(store.clone(), store.clone());
//! let patterns = vec![PermissionPattern::parse("user:*")?];
//! let report = matcher.reconcile("admin", &acme, &patterns, ReconcileMode::Additive).await?;
//!
//! assert_eq!(report.granted, 2);
//! # Ok(())
//! # }
//! ```

mod assignments;
mod matcher;


pub use assignments::RoleAssignments;
pub use matcher::PermissionMatcher;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;

/// Reconciliation policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Ensure every candidate is granted; leave other grants untouched
    #[default]
    Additive,
    /// Make the grant set exactly equal to the candidate set
    Replace,
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileMode::Additive => f.write_str("additive"),
            ReconcileMode::Replace => f.write_str("replace"),
        }
    }
}

impl FromStr for ReconcileMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "additive" => Ok(ReconcileMode::Additive),
            "replace" => Ok(ReconcileMode::Replace),
            other => Err(format!("unknown reconcile mode '{}'", other)),
        }
    }
}

/// One grant or revoke that failed and was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantFailure {
    /// Permission name
    pub permission: String,
    /// Store error message
    pub reason: String,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Newly created grants
    pub granted: usize,
    /// Grants removed (replace mode only)
    pub revoked: usize,
    /// Candidates that were already granted
    pub unchanged: usize,
    /// Writes that failed and were skipped
    pub failures: Vec<GrantFailure>,
    /// Names of every permission the patterns resolved to
    pub candidates: BTreeSet<String>,
}

impl ReconcileReport {
    /// Whether the pass changed nothing
    pub fn is_noop(&self) -> bool {
        self.granted == 0 && self.revoked == 0
    }

    /// Whether every write succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Per-role outcomes of a provisioning run
#[derive(Debug, Default)]
pub struct ProvisionReport {
    pub roles: BTreeMap<String, Result<ReconcileReport>>,
}

impl ProvisionReport {
    /// Whether every role reconciled without a hard failure
    pub fn is_success(&self) -> bool {
        self.roles.values().all(|outcome| outcome.is_ok())
    }

    /// Grants created across every role
    pub fn total_granted(&self) -> usize {
        self.roles
            .values()
            .filter_map(|outcome| outcome.as_ref().ok())
            .map(|report| report.granted)
            .sum()
    }

    /// Roles whose pass failed outright
    pub fn failed_roles(&self) -> Vec<&str> {
        self.roles
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(role, _)| role.as_str())
            .collect()
    }
}
