//! Collaborator contracts for the identity engine

pub mod store;
pub mod cache;

// Re-export commonly used traits
pub use store::{GrantStore, GrantTransaction, IdentityStore, PermissionCatalog};
pub use cache::ContextCache;
