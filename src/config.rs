//! Configuration file handling.
//!
//! This module handles loading `.user-summary.toml` files and merging them
//! with command-line arguments and environment variables.

use crate::fetcher::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".user-summary.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream resource locations.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Timeout settings.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry settings for upstream fetches.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Upstream REST resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Users resource; a profile lives at `{users_base_url}/{id}`.
    #[serde(default = "default_users_base_url")]
    pub users_base_url: String,

    /// Posts resource; queried as `{posts_base_url}?userId={id}`.
    #[serde(default = "default_posts_base_url")]
    pub posts_base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            users_base_url: default_users_base_url(),
            posts_base_url: default_posts_base_url(),
        }
    }
}

fn default_users_base_url() -> String {
    "https://jsonplaceholder.typicode.com/users".to_string()
}

fn default_posts_base_url() -> String {
    "https://jsonplaceholder.typicode.com/posts".to_string()
}

/// Timeout settings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout of a single upstream HTTP call.
    #[serde(default = "default_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Overall budget of one aggregation call. Zero means the default.
    #[serde(default = "default_timeout_ms")]
    pub aggregate_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: default_timeout_ms(),
            aggregate_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Backoff after the first failed attempt; doubles each time.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from `DEFAULT_CONFIG_FILE` inside `dir`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Values given on the command line or through the environment take
    /// precedence; anything left unset keeps the file or default value.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.users_url {
            self.upstream.users_base_url = url.clone();
        }
        if let Some(ref url) = args.posts_url {
            self.upstream.posts_base_url = url.clone();
        }
        if let Some(ms) = args.http_timeout_ms {
            self.timeouts.http_timeout_ms = ms;
        }
        if let Some(ms) = args.timeout_ms {
            self.timeouts.aggregate_timeout_ms = ms;
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.http_timeout_ms)
    }

    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.aggregate_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
