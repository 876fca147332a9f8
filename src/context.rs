// src/context.rs

//! Run-scoped cancellation and deadline.
//!
//! Every store call made on behalf of a run goes through
//! [`RunContext::guard`], so canceling the run (or hitting its deadline)
//! abandons in-flight queries instead of waiting for them.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Race a store future against cancellation and the deadline.
    pub async fn guard<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        if self.token.is_cancelled() {
            return Err(StoreError::Canceled);
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(StoreError::Canceled),
                    _ = tokio::time::sleep_until(deadline) => Err(StoreError::DeadlineExceeded),
                    res = fut => res,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(StoreError::Canceled),
                    res = fut => res,
                }
            }
        }
    }

    /// Sleep for `period`, returning early (with `false`) on cancellation.
    pub async fn pause(&self, period: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(period) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_when_not_canceled() {
        let ctx = RunContext::new();
        let out = ctx.guard(async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test]
    async fn canceled_context_short_circuits() {
        let ctx = RunContext::new();
        ctx.cancel();
        let out = ctx.guard(async { Ok::<_, StoreError>(1) }).await;
        assert_eq!(out, Err(StoreError::Canceled));
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_future() {
        let ctx = RunContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let out = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert_eq!(out, Err(StoreError::Canceled));
    }

    #[tokio::test]
    async fn deadline_is_not_cancellation() {
        let ctx = RunContext::new().with_timeout(Duration::from_millis(10));
        let out = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert_eq!(out, Err(StoreError::DeadlineExceeded));
    }
}
