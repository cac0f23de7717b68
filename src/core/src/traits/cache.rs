//! Key-value cache collaborator

use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// Byte-oriented cache with per-entry TTL
///
/// A miss is `Ok(None)`, never an error.
#[async_trait]
pub trait ContextCache: Send + Sync {
    /// Fetch a value
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value for `ttl`
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a value (no-op when absent)
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
