//! # Warden Identity Engine
//!
//! Authorization and identity resolution for a multi-tenant identity backend.
//!
//! ## Features
//!
//! - **Capability URLs**: stateless, time-boxed links authenticated with
//!   HMAC-SHA256 over a canonical parameter string
//! - **Permission reconciliation**: wildcard patterns resolved against a
//!   scoped permission catalog and converged into role grants, additive or
//!   destructive, one transaction per role
//! - **Identity resolution**: `(subject, client_id)` joined into a full
//!   identity context and cached with a bounded TTL
//! - **Pluggable collaborators**: persistence and cache are traits from
//!   `warden-core`, with in-memory and PostgreSQL adapters here
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//! use url::Url;
//! use warden_authz::signature::{SignatureCodec, SigningSecret};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = SignatureCodec::new(SigningSecret::new(b"secret".to_vec())?);
//!
//! let mut params = BTreeMap::new();
//! params.insert("user_id".to_string(), "42".to_string());
//!
//! let base = Url::parse("https://id.example.com/verify-email")?;
//! let link = codec.sign_url(&base, params, Duration::from_secs(3600));
//!
//! let clean = codec.verify_url(&link)?;
//! assert_eq!(clean["user_id"], "42");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod permission;
pub mod signature;
pub mod store;

// Re-export commonly used types
pub use cache::MemoryCache;
pub use config::WardenConfig;
pub use error::{AuthzError, CapabilityError, Result, LINK_INVALID_MESSAGE};
pub use identity::{IdentityContext, IdentityContextResolver, ResolverConfig};
pub use permission::{PermissionMatcher, ReconcileMode, ReconcileReport, RoleAssignments};
pub use signature::{SignatureCodec, SigningSecret};
