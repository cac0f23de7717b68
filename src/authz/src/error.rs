//! Error types for the identity engine

use thiserror::Error;
use warden_core::{PatternError, StoreError};

/// Single message shown to end users for any capability-URL failure
pub const LINK_INVALID_MESSAGE: &str = "link invalid or expired";

/// Capability URL verification failures
///
/// Variants are distinct for logs and tests only. Anything user-facing must go
/// through [`CapabilityError::public_message`] so callers cannot learn which
/// check failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// `expires` or `sig` absent or empty
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// `expires` is not a base-10 Unix timestamp
    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),

    /// `expires` is in the past
    #[error("Link expired at {expires} (now {now})")]
    Expired { expires: i64, now: i64 },

    /// Signature does not match the parameters
    #[error("Invalid signature")]
    InvalidSignature,
}

impl CapabilityError {
    /// Message safe to show to the end user
    pub fn public_message(&self) -> &'static str {
        LINK_INVALID_MESSAGE
    }
}

/// Identity engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Permission pattern could not be parsed
    #[error("Invalid permission pattern: {0}")]
    InvalidPattern(#[from] PatternError),

    /// Catalog lookup failed; the reconciliation pass was aborted before any write
    #[error("Catalog lookup failed for pattern '{pattern}': {source}")]
    CatalogLookupFailed {
        pattern: String,
        #[source]
        source: StoreError,
    },

    /// Role name not defined in the scope
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// Grant transaction could not be committed after all attempts
    #[error("Grant commit failed for role '{role}': {source}")]
    GrantCommitFailed {
        role: String,
        #[source]
        source: StoreError,
    },

    /// No identity links the subject to the client
    #[error("User not found for subject '{subject}' and client '{client_id}'")]
    UserNotFound { subject: String, client_id: String },

    /// Persistence failure
    #[error("Persistence failure: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Operation exceeded its deadline
    #[error("Operation timed out")]
    Timeout,

    /// Capability URL rejected
    #[error("Capability URL rejected: {0}")]
    Capability(#[from] CapabilityError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthzError {
    /// Infrastructure faults the caller may retry under its own policy
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthzError::StoreUnavailable(_)
                | AuthzError::GrantCommitFailed { .. }
                | AuthzError::CatalogLookupFailed { .. }
                | AuthzError::Timeout
        )
    }

    /// Legitimate authentication outcomes (never retried)
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AuthzError::UserNotFound { .. } | AuthzError::Capability(_))
    }
}

/// Result type for identity engine operations
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_errors_share_public_message() {
        let errors = [
            CapabilityError::MissingParameter("sig".to_string()),
            CapabilityError::InvalidExpiry("soon".to_string()),
            CapabilityError::Expired { expires: 1, now: 2 },
            CapabilityError::InvalidSignature,
        ];

        for err in &errors {
            assert_eq!(err.public_message(), LINK_INVALID_MESSAGE);
        }
    }

    #[test]
    fn test_error_classification() {
        let not_found = AuthzError::UserNotFound {
            subject: "sub".to_string(),
            client_id: "web".to_string(),
        };
        assert!(not_found.is_unauthenticated());
        assert!(!not_found.is_retryable());

        let unavailable = AuthzError::from(StoreError::unavailable("connection refused"));
        assert!(unavailable.is_retryable());
        assert!(!unavailable.is_unauthenticated());

        let capability = AuthzError::from(CapabilityError::InvalidSignature);
        assert!(capability.is_unauthenticated());
    }
}
