//! Capability URL signing and verification
//!
//! A capability URL carries its own authorization: every query parameter
//! except `sig` is covered by an HMAC-SHA256 signature, and `expires` bounds
//! its lifetime. Verification needs no server-side state.
//!
//! # Canonical form
//!
//! Parameters (minus `sig`) are sorted by key and joined as
//! `k1=v1&k2=v2`. Values are used exactly as given, without escaping, so a
//! value containing `&` or `=` can collide with a different parameter set.
//! Changing this would invalidate every link already issued.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//! use warden_authz::signature::{SignatureCodec, SigningSecret};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = SignatureCodec::new(SigningSecret::new(b"secret".to_vec())?);
//!
//! let mut params = BTreeMap::new();
//! params.insert("user_id".to_string(), "42".to_string());
//!
//! let signed = codec.issue(params, Duration::from_secs(3600));
//! let query = signed.into_iter().collect();
//! let clean = codec.verify(&query)?;
//!
//! assert_eq!(clean.get("user_id").map(String::as_str), Some("42"));
//! assert!(!clean.contains_key("sig"));
//! # Ok(())
//! # }
//! ```

mod codec;
mod secret;

pub use codec::{canonical_string, SignatureCodec, EXPIRES_PARAM, SIG_PARAM};
pub use secret::{SecretHandle, SigningSecret};
