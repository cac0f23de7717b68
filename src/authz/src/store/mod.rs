//! Persistence adapters
//!
//! Both adapters implement the collaborator traits from `warden-core`:
//! [`PermissionCatalog`](warden_core::PermissionCatalog),
//! [`GrantStore`](warden_core::GrantStore) and
//! [`IdentityStore`](warden_core::IdentityStore).

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::{MemoryStore, MemoryStoreStats};
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
