//! Warden - identity engine command line
//!
//! Composition root: loads the configuration, reads the signing secret once
//! and wires the PostgreSQL store and in-memory cache into the engine.
//!
//! ## Commands
//!
//! - `sign` - issue a capability URL
//! - `verify` - verify a capability URL
//! - `provision` - reconcile the configured role table into a scope
//! - `resolve` - resolve the identity context of a subject and client
//! - `check-config` - load and validate the configuration
//!
//! ## Configuration
//!
//! - `WARDEN_CONFIG` - configuration file (default: warden.toml)
//! - `DATABASE_URL` - overrides `database.url`
//! - `RUST_LOG` - log filter (default: info)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use warden_authz::cache::MemoryCache;
use warden_authz::identity::IdentityContextResolver;
use warden_authz::permission::{PermissionMatcher, ReconcileMode};
use warden_authz::signature::SignatureCodec;
use warden_authz::store::PostgresStore;
use warden_authz::{WardenConfig, LINK_INVALID_MESSAGE};
use warden_core::Scope;

/// Warden identity engine CLI
#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - authorization and identity resolution engine")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "warden.toml", env = "WARDEN_CONFIG")]
    config: PathBuf,

    /// Database URL (overrides config)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Issue a signed capability URL
    Sign {
        /// Base URL the parameters are attached to
        base: Url,

        /// Signed parameter, repeatable
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Lifetime in seconds (defaults to signing.link_ttl_secs)
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Verify a capability URL and print its parameters
    Verify {
        url: Url,
    },

    /// Reconcile the configured role table into a scope
    Provision {
        /// Target scope, e.g. `tenant:acme` or `container:billing`
        #[arg(short, long)]
        scope: Scope,

        /// Reconcile mode (defaults to provisioning.mode)
        #[arg(short, long)]
        mode: Option<ReconcileMode>,
    },

    /// Resolve the identity context for a subject and client
    Resolve {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        client_id: String,
    },

    /// Load and validate the configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},warden_authz={}", log_level, log_level).into()),
        )
        .with_target(true)
        .init();

    let mut config = WardenConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }
    config.validate().context("Invalid configuration")?;
    debug!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Command::CheckConfig => {
            println!("Configuration OK");
            println!("  roles: {}", config.roles.len());
            println!("  cache ttl: {}s", config.cache.ttl_secs);
            println!("  provisioning mode: {}", config.provisioning.mode);
            Ok(())
        }
        Command::Sign { base, params, ttl_secs } => {
            let codec = signature_codec(&config)?;
            let ttl = ttl_secs.map(Duration::from_secs).unwrap_or_else(|| config.link_ttl());
            let params: BTreeMap<String, String> = params.into_iter().collect();

            println!("{}", codec.sign_url(&base, params, ttl));
            Ok(())
        }
        Command::Verify { url } => {
            let codec = signature_codec(&config)?;
            match codec.verify_url(&url) {
                Ok(clean) => {
                    let clean: BTreeMap<_, _> = clean.into_iter().collect();
                    println!("{}", serde_json::to_string_pretty(&clean)?);
                    Ok(())
                }
                Err(e) => {
                    debug!(reason = %e, "Capability URL rejected");
                    anyhow::bail!(LINK_INVALID_MESSAGE)
                }
            }
        }
        Command::Provision { scope, mode } => {
            let store = Arc::new(connect(&config).await?);
            let matcher = PermissionMatcher::new(store.clone(), store)
                .with_max_attempts(config.provisioning.max_attempts);
            let mode = mode.unwrap_or(config.provisioning.mode);

            info!(scope = %scope, mode = %mode, roles = config.roles.len(), "Provisioning roles");
            let report = matcher.provision(&scope, &config.roles, mode).await;

            for (role, outcome) in &report.roles {
                match outcome {
                    Ok(r) => println!(
                        "{}: granted={} revoked={} unchanged={} failures={}",
                        role, r.granted, r.revoked, r.unchanged, r.failures.len()
                    ),
                    Err(e) => println!("{}: FAILED ({})", role, e),
                }
            }

            if !report.is_success() {
                anyhow::bail!(
                    "Provisioning failed for roles: {}",
                    report.failed_roles().join(", ")
                );
            }
            Ok(())
        }
        Command::Resolve { subject, client_id } => {
            let store = Arc::new(connect(&config).await?);
            let cache = Arc::new(MemoryCache::new(config.cache_config()));
            let resolver = IdentityContextResolver::new(
                store.clone(),
                store,
                cache,
                config.resolver_config(),
            );

            match resolver.resolve(&subject, &client_id).await {
                Ok(context) => {
                    println!("{}", serde_json::to_string_pretty(&context)?);
                    Ok(())
                }
                Err(e) if e.is_unauthenticated() => {
                    warn!(subject = %subject, client_id = %client_id, "No identity for subject");
                    anyhow::bail!("unauthenticated: {}", e)
                }
                Err(e) => Err(e).context("Identity resolution failed"),
            }
        }
    }
}

fn signature_codec(config: &WardenConfig) -> Result<SignatureCodec> {
    let secret = config
        .signing_secret()
        .with_context(|| {
            format!("Signing secret unavailable (set {})", config.signing.secret_env)
        })?;
    Ok(SignatureCodec::new(secret))
}

async fn connect(config: &WardenConfig) -> Result<PostgresStore> {
    let url = config
        .database
        .url
        .as_deref()
        .context("database.url is not configured")?;

    PostgresStore::new(url, config.database.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' in '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}
