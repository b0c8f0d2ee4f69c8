//! STAC Cache CLI
//!
//! Fetches STAC catalog resources through the tiered cache, keeps
//! collection listings in the durable cache and acquires presigned-URL
//! tokens.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stac_cache::cache::{render_prometheus, SharedPersistentStore};
use stac_cache::durable::SharedLargeStore;
use stac_cache::{
    CookieJar, DurableCacheConfig, DurableKeyValueCache, DurableSetOptions, FileKeyValueStore,
    FileStore, HttpFetcher, HttpTokenProvider, MemoryKeyValueStore, PresignedTokenCache,
    RequestOptions, Result, TieredCache, TieredCacheConfig, TokenCacheConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// STAC Cache - tiered caching for STAC catalog clients
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tiered cache configuration file (YAML)
    #[arg(long, env = "STAC_CACHE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory for the disk tier and bulk durable items (memory only when unset)
    #[arg(long, env = "STAC_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "STAC_CACHE_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "STAC_CACHE_LOG_JSON", global = true)]
    log_json: bool,

    /// Print cache metrics in Prometheus text format on exit
    #[arg(long, env = "STAC_CACHE_PRINT_METRICS", global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch URLs through the tiered cache
    Fetch {
        /// URLs to fetch
        #[arg(required = true)]
        urls: Vec<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Number of passes over the URL list
        #[arg(long, default_value = "1")]
        repeat: u32,
    },

    /// List a catalog's collections, keeping the listing in the durable cache
    Collections {
        /// Root URL of the STAC API
        api_root: String,
    },

    /// Acquire a presigned-URL token for a scope
    Token {
        /// Token service endpoint
        endpoint: String,

        /// Scope (collection id) to acquire a token for
        scope: String,

        /// Sign this URL instead of printing the raw token
        #[arg(long)]
        url: Option<String>,
    },
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!(version = stac_cache::VERSION, "Starting stac-cache");

    let config = match &args.config {
        Some(path) => TieredCacheConfig::from_yaml_file(path)?,
        None => TieredCacheConfig::default(),
    };

    let store = args.cache_dir.as_ref().map(|dir| {
        info!(path = %dir.display(), "Using file-backed disk tier");
        Arc::new(FileStore::new(dir.join("tiers"))) as SharedPersistentStore
    });

    let cache = TieredCache::new(config, Arc::new(HttpFetcher::new()?), store)?;
    cache.init().await?;

    let outcome = match &args.command {
        Command::Fetch {
            urls,
            params,
            repeat,
        } => run_fetch(&cache, urls, params, *repeat).await,
        Command::Collections { api_root } => run_collections(&cache, &args, api_root).await,
        Command::Token {
            endpoint,
            scope,
            url,
        } => run_token(endpoint, scope, url.as_deref()).await,
    };

    if args.print_metrics {
        print!("{}", render_prometheus(&cache.get_stats())?);
    }

    cache.dispose();
    outcome
}

// =============================================================================
// Commands
// =============================================================================

async fn run_fetch(
    cache: &Arc<TieredCache>,
    urls: &[String],
    params: &[(String, String)],
    repeat: u32,
) -> Result<()> {
    let options = params
        .iter()
        .fold(RequestOptions::new(), |options, (k, v)| options.with_param(k, v));

    for pass in 0..repeat.max(1) {
        for url in urls {
            let started = Instant::now();
            let value = cache.get(url, &options).await?;
            let bytes = value.to_bytes()?.len();
            println!(
                "{}",
                json!({
                    "pass": pass,
                    "url": url,
                    "type": value.data_type(),
                    "bytes": bytes,
                    "elapsed_ms": started.elapsed().as_secs_f64() * 1000.0,
                })
            );
        }
    }

    let stats = cache.get_stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_ratio = stats.hit_ratio(),
        "Fetch finished"
    );
    Ok(())
}

async fn run_collections(cache: &Arc<TieredCache>, args: &Args, api_root: &str) -> Result<()> {
    let large: SharedLargeStore = match &args.cache_dir {
        Some(dir) => Arc::new(FileKeyValueStore::new(dir.join("durable"))),
        None => Arc::new(MemoryKeyValueStore::new()),
    };
    let durable = DurableKeyValueCache::new(
        DurableCacheConfig::default(),
        Arc::new(CookieJar::new()),
        large,
    )?;

    let key = format!("collections:{}", api_root);
    let listing = match durable.get::<Value>(&key).await {
        Some(listing) => {
            info!(api_root = %api_root, "Collection listing served from durable cache");
            listing
        }
        None => {
            let url = format!("{}/collections", api_root.trim_end_matches('/'));
            let value = cache.get(&url, &RequestOptions::new()).await?;
            let Some(listing) = value.as_json().cloned() else {
                warn!(url = %url, data_type = %value.data_type(), "Collections endpoint did not return JSON");
                return Ok(());
            };
            durable
                .set_with(&key, &listing, DurableSetOptions::bulk())
                .await;
            listing
        }
    };

    let collections = listing
        .get("collections")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for collection in collections {
        let id = collection.get("id").and_then(Value::as_str).unwrap_or("?");
        let title = collection.get("title").and_then(Value::as_str).unwrap_or("");
        println!("{}\t{}", id, title);
    }
    info!(count = collections.len(), "Listed collections");
    Ok(())
}

async fn run_token(endpoint: &str, scope: &str, url: Option<&str>) -> Result<()> {
    let provider = Arc::new(HttpTokenProvider::new(endpoint)?);
    let tokens = PresignedTokenCache::new(TokenCacheConfig::default(), provider);

    match url {
        Some(url) => println!("{}", tokens.sign_url(url, scope).await?),
        None => println!("{}", tokens.acquire(scope).await?),
    }
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=info", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr; stdout carries command output
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
