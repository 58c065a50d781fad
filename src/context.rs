//! Per-request deadline and cancellation.
//!
//! A [`RequestContext`] is passed down every call boundary of one
//! aggregation. Every suspension point (network call, backoff wait) races
//! its work against [`RequestContext::done`], so a fired deadline or a
//! cancelled token stops the work at the next await.

use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline plus cooperative cancellation signal for one call tree.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RequestContext {
    /// A root context with no deadline that is never cancelled on its own.
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Derive a child whose deadline is the earlier of the parent's and
    /// `now + timeout`. Cancelling the parent cancels the child, not the
    /// other way around.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => parent.min(candidate),
            None => candidate,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Signal cancellation. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking check used before starting new upstream work.
    pub fn check(&self) -> Result<(), FetchError> {
        if self.token.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(FetchError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves with the interruption reason once the token is cancelled or
    /// the deadline passes, whichever comes first.
    pub async fn done(&self) -> FetchError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => FetchError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => FetchError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                FetchError::Cancelled
            }
        }
    }

    /// Drive `work` to completion unless the context is interrupted first.
    pub async fn run<F>(&self, work: F) -> Result<F::Output, FetchError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            output = work => Ok(output),
        }
    }

    /// Interruptible sleep between retry attempts.
    pub async fn sleep(&self, duration: Duration) -> Result<(), FetchError> {
        self.run(tokio::time::sleep(duration)).await
    }
}
