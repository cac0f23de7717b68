//! Request-scoped identity context resolution
//!
//! Given a bearer subject and a client id, assembles the user, tenant,
//! identity provider, client, effective roles and permission closure, then
//! serves repeat requests from a TTL cache with bounded staleness.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use warden_authz::cache::MemoryCache;
//! use warden_authz::identity::{IdentityContextResolver, ResolverConfig};
//! use warden_authz::store::MemoryStore;
//! use warden_core::{AuthClient, IdentityProvider, Tenant, User};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! store.insert_tenant(Tenant::new("acme", "Acme")).await;
//! store.insert_user(User::new("u1", "acme", "alice")).await;
//! store
//!     .insert_provider(IdentityProvider::new("idp", "acme", "oidc", "https://idp.acme.test"))
//!     .await;
//! store.insert_client(AuthClient::new("web", "acme", "idp", "Web")).await;
//! store.link_identity("sub-alice", "web", "u1").await;
//!
//! let resolver = IdentityContextResolver::new(
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(MemoryCache::default()),
//!     ResolverConfig::default(),
//! );
//!
//! let context = resolver.resolve("sub-alice", "web").await?;
//! assert_eq!(context.user.username, "alice");
//! # Ok(())
//! # }
//! ```

mod context;
mod metrics;
mod resolver;
mod singleflight;

pub use context::IdentityContext;
pub use metrics::{MetricsSnapshot, ResolverMetrics};
pub use resolver::{IdentityContextResolver, ResolverConfig};
