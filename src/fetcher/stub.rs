//! In-memory fetchers for exercising the aggregator without a network.

use super::Fetcher;
use crate::context::RequestContext;
use crate::error::{FetchError, Resource};
use crate::models::{Post, UserProfile};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub enum StubOutcome<T> {
    Ok(T),
    Status(u16),
}

/// Answers every call with a canned outcome after an optional delay.
///
/// The delay observes the request context, so a cancelled sibling returns
/// promptly instead of sleeping it out.
pub struct StubFetcher<T> {
    resource: Resource,
    outcome: StubOutcome<T>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    interrupted: Arc<AtomicUsize>,
}

impl<T: Clone> StubFetcher<T> {
    pub fn new(resource: Resource, outcome: StubOutcome<T>) -> Self {
        Self {
            resource,
            outcome,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            interrupted: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter of `fetch` invocations.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Shared counter of calls that stopped because the context fired.
    pub fn interrupted(&self) -> Arc<AtomicUsize> {
        self.interrupted.clone()
    }

    async fn respond(&self, ctx: &RequestContext) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            if let Err(reason) = ctx.sleep(self.delay).await {
                self.interrupted.fetch_add(1, Ordering::SeqCst);
                return Err(reason);
            }
        }
        match &self.outcome {
            StubOutcome::Ok(value) => Ok(value.clone()),
            StubOutcome::Status(status) => Err(FetchError::UpstreamStatus {
                resource: self.resource,
                status: *status,
            }),
        }
    }
}

#[async_trait]
impl Fetcher for StubFetcher<UserProfile> {
    type Output = UserProfile;

    async fn fetch(&self, _user_id: i64, ctx: &RequestContext) -> Result<UserProfile, FetchError> {
        self.respond(ctx).await
    }
}

#[async_trait]
impl Fetcher for StubFetcher<Vec<Post>> {
    type Output = Vec<Post>;

    async fn fetch(&self, _user_id: i64, ctx: &RequestContext) -> Result<Vec<Post>, FetchError> {
        self.respond(ctx).await
    }
}

pub fn john_doe() -> UserProfile {
    UserProfile {
        id: 1,
        display_name: "John Doe".to_string(),
        email: "john@example.com".to_string(),
    }
}

pub fn two_posts() -> Vec<Post> {
    vec![Post { owner_user_id: 1 }, Post { owner_user_id: 1 }]
}
