//! Exposes the command line application.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resolvecache_service::config::Config;
use resolvecache_service::{CacheBuster, CacheKey, ResolverCacheService, metrics};

use crate::logging;

/// Commands to inspect and maintain the resolver cache store.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the current cache generation, creating one if there is none.
    Generation,

    /// Rotate the cache generation, invalidating every cached result.
    Invalidate,

    /// Print the cached result for a logical key.
    Get {
        /// The key items as JSON, for example `[["A","prop1"],1]`.
        items: String,
    },

    /// Delete a raw key from the store, for example `cacheBuster`.
    Delete {
        /// The fully-qualified store key.
        key: String,
    },
}

/// Command line interface parser.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    let sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: We are in a single-threaded context, the runtime is created below.
    unsafe { logging::init_logging(&config) };

    if let Some(ref statsd) = config.metrics.statsd {
        let hostname = config.metrics.hostname_tag.clone().and_then(|tag| {
            hostname::get()
                .ok()
                .and_then(|s| s.into_string().ok())
                .map(|name| (tag, name))
        });
        let environment = config.metrics.environment_tag.clone().and_then(|tag| {
            sentry
                .options()
                .environment
                .as_ref()
                .map(|name| (tag, name.to_string()))
        });

        let mut tags = config.metrics.custom_tags.clone();
        tags.extend(hostname);
        tags.extend(environment);
        metrics::configure_statsd(&config.metrics.prefix, statsd, tags)
            .context("failed to configure statsd")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")?;
    let service = ResolverCacheService::from_config(&config)?;

    let output = runtime.block_on(run(&service, cli.command))?;
    println!("{output}");
    Ok(())
}

/// Runs a single command against the store of `service` and returns what to print.
pub async fn run(service: &ResolverCacheService, command: Command) -> Result<String> {
    let output = match command {
        Command::Generation => {
            let generation = service.request_cache().generation().await?;
            generation.to_string()
        }
        Command::Invalidate => {
            let generation = service.invalidate().await?;
            tracing::info!(%generation, "Invalidated all cached results");
            generation.to_string()
        }
        Command::Get { items } => {
            let items: serde_json::Value =
                serde_json::from_str(&items).context("key items must be valid JSON")?;
            let key = CacheKey::from_items(&items);

            // read-only: never bootstrap a generation here
            let key_name = &service.config().cache_buster_key;
            let generation = match service.store().get(key_name).await? {
                Some(token) if !token.is_empty() => CacheBuster::from(token),
                _ => anyhow::bail!("no cache generation under {key_name}"),
            };
            let scoped_key = generation.scope(&key);

            match service.store().get(&scoped_key).await? {
                Some(value) => value,
                None => anyhow::bail!("no cached result for {scoped_key}"),
            }
        }
        Command::Delete { key } => {
            service.store().delete(&key).await?;
            format!("deleted {key}")
        }
    };
    Ok(output)
}
