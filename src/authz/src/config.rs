//! Engine configuration loading and validation

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::error::{AuthzError, Result};
use crate::identity::ResolverConfig;
use crate::permission::{ReconcileMode, RoleAssignments};
use crate::signature::SigningSecret;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub signing: SigningSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub resolver: ResolverSection,

    #[serde(default)]
    pub provisioning: ProvisioningSection,

    #[serde(default)]
    pub database: DatabaseSection,

    /// Static role-assignment table
    #[serde(default)]
    pub roles: RoleAssignments,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SigningSection {
    /// Environment variable holding the HMAC key
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    #[serde(default = "default_link_ttl")]
    pub link_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverSection {
    #[serde(default = "default_true")]
    pub single_flight: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvisioningSection {
    #[serde(default)]
    pub mode: ReconcileMode,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for SigningSection {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
            link_ttl_secs: default_link_ttl(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            capacity: default_cache_capacity(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            single_flight: true,
            timeout_ms: None,
        }
    }
}

impl Default for ProvisioningSection {
    fn default() -> Self {
        Self {
            mode: ReconcileMode::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_true() -> bool { true }
fn default_secret_env() -> String { "WARDEN_SIGNING_SECRET".to_string() }
fn default_link_ttl() -> u64 { 86_400 }
fn default_cache_ttl() -> u64 { 600 }
fn default_cache_capacity() -> usize { 10_000 }
fn default_key_prefix() -> String { "identity-context".to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_max_connections() -> u32 { 25 }

impl WardenConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AuthzError::Config(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AuthzError::Config(format!("failed to parse configuration: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.signing.secret_env.is_empty() {
            return Err(AuthzError::Config("signing.secret_env cannot be empty".to_string()));
        }

        if self.signing.link_ttl_secs == 0 {
            return Err(AuthzError::Config("signing.link_ttl_secs must be positive".to_string()));
        }

        if self.cache.ttl_secs == 0 {
            return Err(AuthzError::Config("cache.ttl_secs must be positive".to_string()));
        }

        if self.cache.capacity == 0 {
            return Err(AuthzError::Config("cache.capacity must be positive".to_string()));
        }

        if self.resolver.timeout_ms == Some(0) {
            return Err(AuthzError::Config("resolver.timeout_ms must be positive".to_string()));
        }

        if self.provisioning.max_attempts == 0 {
            return Err(AuthzError::Config(
                "provisioning.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(AuthzError::Config("database.max_connections must be positive".to_string()));
        }

        if let Some((role, _)) = self.roles.iter().find(|(_, patterns)| patterns.is_empty()) {
            return Err(AuthzError::Config(format!("role '{}' lists no permission patterns", role)));
        }

        Ok(())
    }

    /// Read the HMAC key from the configured environment variable
    ///
    /// Call once at startup and inject the result; nothing else reads it.
    pub fn signing_secret(&self) -> Result<SigningSecret> {
        SigningSecret::from_env(&self.signing.secret_env)
    }

    /// Lifetime of issued capability URLs
    pub fn link_ttl(&self) -> Duration {
        Duration::from_secs(self.signing.link_ttl_secs)
    }

    /// Resolver settings derived from the `[cache]` and `[resolver]` sections
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            key_prefix: self.cache.key_prefix.clone(),
            single_flight: self.resolver.single_flight,
            timeout: self.resolver.timeout_ms.map(Duration::from_millis),
        }
    }

    /// In-memory cache settings
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::PermissionPattern;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = WardenConfig::from_toml_str("").unwrap();

        assert_eq!(config.signing.secret_env, "WARDEN_SIGNING_SECRET");
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.cache.capacity, 10_000);
        assert!(config.resolver.single_flight);
        assert_eq!(config.provisioning.mode, ReconcileMode::Additive);
        assert_eq!(config.provisioning.max_attempts, 3);
        assert_eq!(config.database.max_connections, 25);
        assert!(config.roles.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_document() {
        let config = WardenConfig::from_toml_str(
            r#"
            [signing]
            secret_env = "LINK_KEY"
            link_ttl_secs = 3600

            [cache]
            ttl_secs = 120
            key_prefix = "ctx"

            [resolver]
            single_flight = false
            timeout_ms = 250

            [provisioning]
            mode = "replace"

            [database]
            url = "postgresql://localhost/warden"

            [roles]
            admin = ["*"]
            viewer = ["user:read", "org:*"]
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.link_ttl(), Duration::from_secs(3600));
        assert_eq!(config.provisioning.mode, ReconcileMode::Replace);
        assert_eq!(
            config.roles.get("viewer").unwrap()[1],
            PermissionPattern::Prefix("org:".to_string())
        );

        let resolver = config.resolver_config();
        assert_eq!(resolver.ttl, Duration::from_secs(120));
        assert_eq!(resolver.key_prefix, "ctx");
        assert!(!resolver.single_flight);
        assert_eq!(resolver.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_empty_pattern_fails_parsing() {
        let err = WardenConfig::from_toml_str("[roles]\nadmin = [\"\"]").unwrap_err();
        assert!(matches!(err, AuthzError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = WardenConfig::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = WardenConfig::default();
        config.provisioning.max_attempts = 0;
        assert!(config.validate().is_err());

        let config = WardenConfig::from_toml_str("[roles]\nempty = []").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let mut config = WardenConfig::default();
        config.signing.secret_env = "WARDEN_TEST_SECRET_THAT_IS_NEVER_SET".to_string();
        assert!(matches!(config.signing_secret(), Err(AuthzError::Config(_))));
    }
}
