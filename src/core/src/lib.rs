//! # Warden Core
//!
//! Shared data model and collaborator contracts for the Warden identity engine.
//! The engine crate depends on these traits; persistence and cache backends
//! implement them.

pub mod types;
pub mod traits;
pub mod error;

// Re-export commonly used types
pub use error::{CacheError, StoreError};
pub use types::{
    AuthClient, GrantOutcome, IdentityGraph, IdentityProvider, Permission, PermissionPattern,
    PatternError, Role, Scope, Tenant, User,
};
pub use traits::{ContextCache, GrantStore, GrantTransaction, IdentityStore, PermissionCatalog};

