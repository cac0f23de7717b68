use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use warden_core::{CacheError, ContextCache, GrantStore, IdentityStore};

use super::context::IdentityContext;
use super::metrics::ResolverMetrics;
use super::singleflight::{Singleflight, Slot};
use crate::error::{AuthzError, Result};

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Lifetime of a cached context
    pub ttl: Duration,

    /// Namespace prepended to every cache key
    pub key_prefix: String,

    /// Coalesce concurrent cold-cache loads of the same key
    pub single_flight: bool,

    /// Deadline applied by [`IdentityContextResolver::resolve`]
    pub timeout: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            key_prefix: "identity-context".to_string(),
            single_flight: true,
            timeout: None,
        }
    }
}

/// Resolves `(subject, client_id)` to an [`IdentityContext`], cache first
///
/// # Architecture
///
/// ```text
/// resolve → cache.get ──hit──→ decode → done
///               │
///              miss → [single-flight] → find_identity → permissions_for_roles
///                                            │                  │
///                                       not found          cache.set (best effort)
///                                            ↓                  ↓
///                                      UserNotFound           done
/// ```
///
/// Writes to users, tenants or clients do not invalidate the cache, so a
/// change may take up to the TTL to become visible.
pub struct IdentityContextResolver {
    /// Joined identity lookups
    identities: Arc<dyn IdentityStore>,

    /// Permission closure per role
    grants: Arc<dyn GrantStore>,

    /// Serialized context replica
    cache: Arc<dyn ContextCache>,

    config: ResolverConfig,

    in_flight: Singleflight<String, IdentityContext>,

    metrics: Arc<ResolverMetrics>,
}

impl IdentityContextResolver {
    /// Create a resolver
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        grants: Arc<dyn GrantStore>,
        cache: Arc<dyn ContextCache>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            identities,
            grants,
            cache,
            config,
            in_flight: Singleflight::new(),
            metrics: Arc::new(ResolverMetrics::new()),
        }
    }

    /// Resolver configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Shared counters
    pub fn metrics(&self) -> Arc<ResolverMetrics> {
        self.metrics.clone()
    }

    /// Resolve under the configured deadline, if any
    pub async fn resolve(&self, subject: &str, client_id: &str) -> Result<IdentityContext> {
        match self.config.timeout {
            Some(timeout) => self.resolve_with_timeout(subject, client_id, timeout).await,
            None => self.resolve_inner(subject, client_id).await,
        }
    }

    /// Resolve with an explicit deadline
    ///
    /// On expiry the in-flight cache or store call is dropped and
    /// `AuthzError::Timeout` is returned.
    pub async fn resolve_with_timeout(
        &self,
        subject: &str,
        client_id: &str,
        timeout: Duration,
    ) -> Result<IdentityContext> {
        match tokio::time::timeout(timeout, self.resolve_inner(subject, client_id)).await {
            Ok(result) => result,
            Err(_) => {
                self.metrics.record_timeout();
                warn!(
                    subject,
                    client_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Identity resolution timed out"
                );
                Err(AuthzError::Timeout)
            }
        }
    }

    /// Evict one cached context
    pub async fn invalidate(
        &self,
        subject: &str,
        client_id: &str,
    ) -> std::result::Result<(), CacheError> {
        let key = self.cache_key(subject, client_id);
        debug!(subject, client_id, "Invalidating cached identity context");
        self.cache.delete(&key).await
    }

    /// Cache key for a `(subject, client_id)` pair
    ///
    /// The subject is length-prefixed before hashing so no two distinct pairs
    /// share a key.
    pub fn cache_key(&self, subject: &str, client_id: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(subject.len() as u64).to_le_bytes());
        hasher.update(subject.as_bytes());
        hasher.update(client_id.as_bytes());
        format!("{}:{}", self.config.key_prefix, hasher.finalize().to_hex())
    }

    async fn resolve_inner(&self, subject: &str, client_id: &str) -> Result<IdentityContext> {
        let key = self.cache_key(subject, client_id);

        if let Some(context) = self.read_cache(&key, subject, client_id).await {
            self.metrics.record_hit();
            debug!(subject, client_id, "Identity context cache hit");
            return Ok(context);
        }
        self.metrics.record_miss();

        if !self.config.single_flight {
            return self.load(&key, subject, client_id).await;
        }

        match self.in_flight.acquire(key.clone()) {
            Slot::Leader(guard) => {
                let result = self.load(&key, subject, client_id).await;
                guard.finish(result.as_ref().ok().cloned());
                result
            }
            Slot::Follower(mut receiver) => {
                self.metrics.record_coalesced();
                match receiver.recv().await {
                    Ok(Some(context)) => Ok(context),
                    _ => {
                        debug!(
                            subject,
                            client_id, "Coalesced load produced no context, loading directly"
                        );
                        self.load(&key, subject, client_id).await
                    }
                }
            }
        }
    }

    /// Cache read; errors and undecodable payloads count as a miss
    async fn read_cache(
        &self,
        key: &str,
        subject: &str,
        client_id: &str,
    ) -> Option<IdentityContext> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(context) => Some(context),
                Err(e) => {
                    self.metrics.record_cache_read_failure();
                    warn!(
                        subject,
                        client_id,
                        error = %e,
                        "Discarding undecodable cached identity context"
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.metrics.record_cache_read_failure();
                warn!(subject, client_id, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store load followed by a best-effort cache write
    async fn load(&self, key: &str, subject: &str, client_id: &str) -> Result<IdentityContext> {
        self.metrics.record_store_load();

        let graph = self
            .identities
            .find_identity(subject, client_id)
            .await?
            .ok_or_else(|| AuthzError::UserNotFound {
                subject: subject.to_string(),
                client_id: client_id.to_string(),
            })?;

        let role_ids: Vec<String> = graph.roles.iter().map(|r| r.id.clone()).collect();
        let permissions: BTreeSet<String> = self
            .grants
            .permissions_for_roles(&role_ids)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();

        let context = IdentityContext::from_graph(graph, permissions);
        debug!(
            subject,
            client_id,
            user = %context.user.id,
            tenant = %context.tenant.id,
            roles = context.roles.len(),
            permissions = context.permissions.len(),
            "Identity context loaded"
        );

        match serde_json::to_vec(&context) {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(key, bytes, self.config.ttl).await {
                    self.metrics.record_cache_write_failure();
                    warn!(
                        subject,
                        client_id,
                        error = %e,
                        "Cache write failed, returning uncached context"
                    );
                }
            }
            Err(e) => {
                self.metrics.record_cache_write_failure();
                warn!(subject, client_id, error = %e, "Identity context serialization failed");
            }
        }

        Ok(context)
    }
}
