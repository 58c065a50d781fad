//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and environment fallbacks.

use clap::Parser;
use std::path::PathBuf;

/// Exit code for configuration and runtime errors.
pub const EXIT_RUNTIME_ERROR: i32 = 1;

/// user-summary - merge a user's profile and posts into one summary
///
/// Fetches the profile and the post list from two upstream REST resources
/// concurrently and prints the `userSummary` query result.
///
/// Examples:
///   user-summary --user-id 1
///   user-summary --user-id 1 --format text
///   user-summary --user-id 3 --timeout-ms 1500 --log-format json
///   user-summary --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Identifier of the user to summarize (must be positive)
    #[arg(
        short,
        long,
        value_name = "ID",
        allow_negative_numbers = true,
        required_unless_present = "init_config"
    )]
    pub user_id: Option<i64>,

    /// Base URL of the users resource
    #[arg(long, value_name = "URL", env = "USERS_BASE_URL")]
    pub users_url: Option<String>,

    /// Base URL of the posts resource
    #[arg(long, value_name = "URL", env = "POSTS_BASE_URL")]
    pub posts_url: Option<String>,

    /// Timeout of a single upstream HTTP call, in milliseconds
    #[arg(long, value_name = "MS", env = "HTTP_TIMEOUT_MS")]
    pub http_timeout_ms: Option<u64>,

    /// Overall timeout of the aggregation, in milliseconds
    ///
    /// Zero falls back to the default of 5000ms.
    #[arg(long, value_name = "MS", env = "AGG_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .user-summary.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (json, text)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Log output format (text, json)
    ///
    /// Anything other than `json` logs as text.
    #[arg(
        long,
        default_value = "text",
        value_name = "FORMAT",
        env = "LOG_MODE",
        value_parser = LogFormat::parse_lenient
    )]
    pub log_format: LogFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .user-summary.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// GraphQL-style JSON envelope (default)
    #[default]
    Json,
    /// Human-readable lines
    Text,
}

/// Format of log lines written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse_lenient(value: &str) -> Result<Self, String> {
        if value.trim().eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else {
            Ok(LogFormat::Text)
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    ///
    /// Invalid arguments or environment values exit with
    /// [`EXIT_RUNTIME_ERROR`]; `--help` and `--version` exit with 0.
    pub fn parse_args() -> Self {
        match Self::try_parse() {
            Ok(args) => args,
            Err(e) => {
                let _ = e.print();
                std::process::exit(usage_exit_code(&e));
            }
        }
    }

    /// Validate the parsed arguments.
    ///
    /// The user id itself is not checked here; the aggregator reports a
    /// non-positive id as a query error.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        for url in [&self.users_url, &self.posts_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!(
                    "Upstream URL must start with 'http://' or 'https://': {}",
                    url
                ));
            }
        }

        if self.http_timeout_ms == Some(0) {
            return Err("HTTP timeout must be at least 1 millisecond".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// Exit code for a failed argument parse.
pub fn usage_exit_code(error: &clap::Error) -> i32 {
    if error.use_stderr() {
        EXIT_RUNTIME_ERROR
    } else {
        0
    }
}
