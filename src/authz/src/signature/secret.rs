//! Process-wide HMAC key
//!
//! The key is constructed once by the composition root and injected into the
//! codec. `SecretHandle::rotate` is the only mutation point; rotating
//! invalidates every outstanding unexpired link.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::{AuthzError, Result};

/// HMAC key material, zeroed on drop
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    /// Wrap raw key bytes; an empty key is rejected
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.is_empty() {
            return Err(AuthzError::Config("signing secret cannot be empty".to_string()));
        }
        Ok(Self(bytes))
    }

    /// Read the key from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let value = std::env::var(var)
            .map_err(|_| AuthzError::Config(format!("environment variable {} is not set", var)))?;
        Self::new(value.into_bytes())
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Shared, hot-swappable reference to the current signing secret
#[derive(Clone, Debug)]
pub struct SecretHandle {
    current: Arc<RwLock<Arc<SigningSecret>>>,
}

impl SecretHandle {
    /// Create a handle around an initial secret
    pub fn new(secret: SigningSecret) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(secret))),
        }
    }

    /// Snapshot of the active secret
    pub fn current(&self) -> Arc<SigningSecret> {
        self.current.read().clone()
    }

    /// Replace the active secret
    pub fn rotate(&self, secret: SigningSecret) {
        *self.current.write() = Arc::new(secret);
        tracing::warn!("Signing secret rotated; outstanding capability URLs are now invalid");
    }
}
