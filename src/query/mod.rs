//! Query front door.
//!
//! Resolves the `userSummary(userId)` query against the [`Aggregator`] and
//! shapes the outcome as a GraphQL-style response: the summary under
//! `data.userSummary`, or `null` there plus exactly one entry in `errors`.

use crate::aggregator::Aggregator;
use crate::context::RequestContext;
use crate::models::UserSummary;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

/// Name of the only query this front door serves.
pub const USER_SUMMARY_QUERY: &str = "userSummary";

/// Top-level response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: QueryData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<QueryError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    pub user_summary: Option<UserSummary>,
}

/// One user-visible error entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryError {
    pub message: String,
    pub path: Vec<String>,
}

impl QueryResponse {
    pub fn success(summary: UserSummary) -> Self {
        Self {
            data: QueryData {
                user_summary: Some(summary),
            },
            errors: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: QueryData { user_summary: None },
            errors: vec![QueryError {
                message: message.into(),
                path: vec![USER_SUMMARY_QUERY.to_string()],
            }],
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.data.user_summary.is_some()
    }
}

/// Maps front-door queries onto aggregation calls.
#[derive(Clone)]
pub struct QueryResolver {
    aggregator: Aggregator,
    timeout: Option<Duration>,
}

impl QueryResolver {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            timeout: None,
        }
    }

    /// Per-query timeout passed to the aggregator instead of its default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve `userSummary(userId: user_id)`.
    pub async fn user_summary(&self, ctx: &RequestContext, user_id: i64) -> QueryResponse {
        let started = Instant::now();
        let result = self
            .aggregator
            .get_user_summary(ctx, user_id, self.timeout)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(summary) => {
                info!(
                    query = USER_SUMMARY_QUERY,
                    user_id,
                    duration_ms,
                    outcome = "ok",
                    "Query resolved"
                );
                QueryResponse::success(summary)
            }
            Err(error) => {
                info!(
                    query = USER_SUMMARY_QUERY,
                    user_id,
                    duration_ms,
                    outcome = "error",
                    error = %error,
                    "Query resolved"
                );
                QueryResponse::failure(error.to_string())
            }
        }
    }
}
