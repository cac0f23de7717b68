//! Shared types for the Warden identity engine

pub mod identity;
pub mod permission;
pub mod scope;

// Re-export commonly used types
pub use identity::{AuthClient, IdentityGraph, IdentityProvider, Tenant, User};
pub use permission::{GrantOutcome, PatternError, Permission, PermissionPattern, Role};
pub use scope::Scope;
