// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tick::Clock;

use crate::store::StoreError;

/// Retries store reads that failed with [`StoreError::Unavailable`] exactly once.
///
/// Writes never go through this: a write that may or may not have been applied is not safe to
/// repeat.
#[derive(Clone, Debug)]
pub(crate) struct ReadRetry {
    backoff: Duration,
    clock: Clock,
}

impl ReadRetry {
    pub(crate) fn new(backoff: Duration, clock: &Clock) -> Self {
        Self {
            backoff,
            clock: clock.clone(),
        }
    }

    /// Runs `attempt`, and once more after the backoff if the store was unavailable.
    pub(crate) async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match attempt().await {
            Err(error) if error.is_unavailable() => {
                tracing::warn!(
                    store.operation = operation,
                    error = %error,
                    backoff_ms = self.backoff.as_millis(),
                    "store unavailable, retrying read once"
                );

                if !self.backoff.is_zero() {
                    self.clock.delay(self.backoff).await;
                }

                attempt().await.inspect_err(|error| {
                    tracing::error!(store.operation = operation, error = %error, "store read failed after retry");
                })
            }
            result => result,
        }
    }
}
