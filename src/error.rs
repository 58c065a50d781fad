//! Error types for upstream fetches and summary aggregation.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Upstream resource a fetch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Posts,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::User => write!(f, "user"),
            Resource::Posts => write!(f, "posts"),
        }
    }
}

/// Failure of a single logical fetch against an upstream resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The target URL could not be built. Never retried.
    #[error("creating {resource} request: {reason}")]
    RequestBuild { resource: Resource, reason: String },

    /// The upstream answered with something other than 200.
    #[error("{resource} upstream returned status code {status}")]
    UpstreamStatus { resource: Resource, status: u16 },

    /// Connection, timeout or body read failure.
    #[error("doing {resource} request: {source}")]
    Transport {
        resource: Resource,
        #[source]
        source: reqwest::Error,
    },

    /// A 200 response whose body does not match the expected shape. Never retried.
    #[error("decoding {resource} response: {source}")]
    Decode {
        resource: Resource,
        #[source]
        source: serde_json::Error,
    },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether another attempt may succeed where this one failed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            FetchError::UpstreamStatus { .. } | FetchError::Transport { .. }
        )
    }
}

/// Failure of a whole `get_user_summary` call.
///
/// Upstream failures keep a stable prefix naming the failing branch so
/// callers can match on the cause without inspecting the inner error.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("invalid user ID {0}: must be a positive integer")]
    InvalidArgument(i64),

    #[error("fetching user: {0}")]
    UpstreamUser(#[source] FetchError),

    #[error("fetching posts: {0}")]
    UpstreamPosts(#[source] FetchError),

    #[error("deadline exceeded: user summary not ready within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("user summary request cancelled")]
    Cancelled,
}

impl SummaryError {
    /// Label a branch failure, folding context interruptions into the
    /// call-level deadline and cancellation variants.
    pub fn from_branch(resource: Resource, error: FetchError, budget: Duration) -> Self {
        match (resource, error) {
            (_, FetchError::DeadlineExceeded) => SummaryError::DeadlineExceeded(budget),
            (_, FetchError::Cancelled) => SummaryError::Cancelled,
            (Resource::User, error) => SummaryError::UpstreamUser(error),
            (Resource::Posts, error) => SummaryError::UpstreamPosts(error),
        }
    }
}
