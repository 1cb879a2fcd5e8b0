//! dhpcache command-line tool
//!
//! Runs a single cache operation against the configured backend and prints
//! the result as JSON.

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt};

use dhpcache_client::{Cache, CacheBackend};
use dhpcache_core::config::Settings;
use dhpcache_core::config::logging::LoggingConfig;
use dhpcache_core::error::AppError;

#[derive(Debug, Parser)]
#[command(name = "dhpcache", version, about = "Query a local or replicated cache")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the configured backend type (`local` or `replicated`).
    #[arg(long = "type", global = true)]
    cache_type: Option<String>,

    /// How long to wait for a replicated connection before running the command.
    #[arg(long, global = true, default_value_t = 2000)]
    wait_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a value.
    Get {
        /// Cache key.
        key: String,
    },
    /// Store a value. JSON is stored structured; anything else as a string.
    Set {
        /// Cache key.
        key: String,
        /// Value to store.
        value: String,
        /// Time to live in seconds.
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Remove a value and print what was removed.
    Delete {
        /// Cache key.
        key: String,
    },
    /// Remove every entry.
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(cache_type) = &cli.cache_type {
        settings.cache.cache_type = cache_type.clone();
    }

    init_logging(&settings.logging);

    match run(&cli, settings).await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            tracing::error!("Command failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Build the cache and run the requested command.
async fn run(cli: &Cli, settings: Settings) -> Result<Value, AppError> {
    let cache = Cache::new(&settings.cache)?;
    tracing::info!(
        name = cache.name(),
        cache_type = %cache.cache_type(),
        "Cache initialized"
    );

    if !cache.wait_ready(Duration::from_millis(cli.wait_ms)).await {
        tracing::warn!("Cache connection not ready after {}ms", cli.wait_ms);
    }

    let output = match &cli.command {
        Command::Get { key } => cache.get(key).await?.unwrap_or(Value::Null),
        Command::Set { key, value, ttl } => {
            let value = parse_value(value);
            let ok = cache
                .set(key, value, ttl.map(Duration::from_secs))
                .await?;
            Value::Bool(ok)
        }
        Command::Delete { key } => cache.delete(key).await?.unwrap_or(Value::Null),
        Command::Clear => {
            cache.clear().await?;
            Value::Bool(true)
        }
    };

    Ok(output)
}

/// Parse a command-line value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
