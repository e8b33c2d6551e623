//! Time bounds on external calls.
//!
//! A call that exceeds its bound is abandoned and reported as a transient
//! timeout, which the caller treats like any other transient failure of that
//! record. Nothing is retried inside a pass; the next cycle is the retry.

use std::future::Future;
use std::time::Duration;

use msync_core::error::{SyncError, SyncResult};

/// Wraps collaborator calls in a fixed timeout.
#[derive(Debug, Clone, Copy)]
pub struct CallTimeout {
    limit: Duration,
}

impl CallTimeout {
    /// Create a bound of `limit` per call.
    #[must_use]
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// The configured bound.
    #[must_use]
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// The bound in milliseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn limit_ms(&self) -> u64 {
        u64::try_from(self.limit.as_millis()).unwrap_or(u64::MAX)
    }

    /// Await `call`, failing with [`SyncError::Timeout`] once the bound elapses.
    pub async fn run<T, F>(&self, operation: &str, call: F) -> SyncResult<T>
    where
        F: Future<Output = SyncResult<T>>,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation = operation,
                    timeout_ms = self.limit_ms(),
                    "External call timed out"
                );
                Err(SyncError::timeout(operation, self.limit))
            }
        }
    }
}
