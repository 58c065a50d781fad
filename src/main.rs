//! user-summary - backend-for-frontend user summary aggregator
//!
//! Resolves the `userSummary(userId)` query by fetching a user's profile
//! and posts from two upstream REST resources concurrently and merging
//! them into one summary.
//!
//! Exit codes:
//!   0 - Summary returned
//!   1 - Runtime error (configuration, HTTP client setup, output)
//!   2 - Query resolved with an error (invalid id, upstream failure, timeout)

mod aggregator;
mod cli;
mod config;
mod context;
mod error;
mod fetcher;
mod models;
mod query;
mod report;

use aggregator::Aggregator;
use anyhow::{Context, Result};
use cli::{Args, LogFormat, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use context::RequestContext;
use fetcher::{HttpPostsFetcher, HttpUserFetcher};
use query::QueryResolver;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("user-summary v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Query failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .user-summary.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging on stderr; stdout carries the query result.
fn init_logging(args: &Args) {
    let builder = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = match args.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.compact().finish()),
    };
    installed.expect("Failed to set tracing subscriber");
}

/// Resolve one query and print it. Returns the exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let user_id = args
        .user_id
        .context("--user-id is required unless --init-config is given")?;

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    info!(
        users_url = %config.upstream.users_base_url,
        posts_url = %config.upstream.posts_base_url,
        http_timeout_ms = config.timeouts.http_timeout_ms,
        aggregate_timeout_ms = config.timeouts.aggregate_timeout_ms,
        retry_attempts = config.retry_policy().attempts(),
        "Config loaded"
    );

    let resolver = build_resolver(&config)?;

    // Ctrl-C cancels the in-flight query instead of killing it mid-request.
    let root = RequestContext::background();
    let interrupt = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling query");
            interrupt.cancel();
        }
    });

    let response = resolver.user_summary(&root, user_id).await;

    let output = match args.format {
        OutputFormat::Json => format!("{}\n", report::generate_json_report(&response)?),
        OutputFormat::Text => report::generate_text_report(&response),
    };
    print!("{}", output);

    Ok(if response.is_success() { 0 } else { 2 })
}

/// Wire the shared HTTP client, both fetchers and the aggregator.
fn build_resolver(config: &Config) -> Result<QueryResolver> {
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .connect_timeout(Duration::from_secs(5))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .context("Failed to create HTTP client")?;

    let retry = config.retry_policy();
    let users = HttpUserFetcher::new(client.clone(), &config.upstream.users_base_url, retry);
    let posts = HttpPostsFetcher::new(client, &config.upstream.posts_base_url, retry);

    let timeout = config.aggregate_timeout();
    let aggregator = Aggregator::new(Arc::new(users), Arc::new(posts), timeout);
    Ok(QueryResolver::new(aggregator).with_timeout(timeout))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_from_dir(Path::new(".")) {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
