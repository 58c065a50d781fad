//! Single-assignment failure slot shared by concurrent branches.

use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Holds the first failure recorded by any branch and cancels the shared
/// token when it is set. Later failures are discarded.
#[derive(Debug)]
pub struct FirstFailure<E> {
    slot: OnceLock<E>,
    token: CancellationToken,
}

impl<E> FirstFailure<E> {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            slot: OnceLock::new(),
            token,
        }
    }

    /// Record `error` if nothing was recorded yet. Returns whether this call
    /// won the slot. The token is cancelled either way.
    pub fn record(&self, error: E) -> bool {
        let won = self.slot.set(error).is_ok();
        if !won {
            debug!("Discarding failure observed after the first one");
        }
        self.token.cancel();
        won
    }

    pub fn into_inner(self) -> Option<E> {
        self.slot.into_inner()
    }
}
