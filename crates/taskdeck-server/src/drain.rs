//! Stopping the listener without cutting engine transactions short.
//!
//! Every engine call runs on the blocking pool through [`EngineDrain::run`].
//! Once [`EngineDrain::drain`] starts, new calls get 503 and the drain waits
//! for the listener and then for every blocking call still holding a
//! connection.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::errors::ApiError;

/// Drain timeout when the caller gives none.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Gate and tracker for blocking engine calls.
#[derive(Debug, Default)]
pub struct EngineDrain {
    token: CancellationToken,
    calls: TaskTracker,
}

impl EngineDrain {
    /// Open gate, nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token the listener stops on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether the drain has started.
    pub fn is_draining(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Blocking calls that have not returned yet.
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    /// Run `f` on the blocking pool, tracked until it returns.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_draining() {
            return Err(ApiError::ShuttingDown);
        }
        Ok(self.calls.spawn_blocking(f).await?)
    }

    /// Stop the listener, then wait for `serve` and every tracked call.
    ///
    /// Returns `false` when `timeout` ran out first.
    pub async fn drain(&self, serve: JoinHandle<()>, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        let deadline = Instant::now() + timeout;

        self.token.cancel();
        let _ = self.calls.close();
        info!(in_flight = self.in_flight(), ?timeout, "draining");

        match tokio::time::timeout_at(deadline, serve).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%error, "listener task failed"),
            Err(_) => {
                warn!("listener still running after {timeout:?}");
                return false;
            }
        }

        if tokio::time::timeout_at(deadline, self.calls.wait()).await.is_err() {
            warn!(
                in_flight = self.in_flight(),
                "engine calls still running after {timeout:?}"
            );
            return false;
        }
        true
    }
}
