//! Backoff for idempotent ledger queries.
//!
//! A query is repeated when its [`LedgerError`] is transient (see
//! [`LedgerError::is_transient`]): a transport failure, a timeout, or a
//! 5xx status from the node. JSON-RPC error objects, 4xx statuses and
//! malformed results are final. Transaction submission never runs under a
//! policy, since a resent transaction would be a second ledger entry.

use std::future::Future;
use std::time::Duration;

use crate::error::LedgerError;

/// How often, and how patiently, a query is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry. Doubles for each one after it.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three retries after 200ms, 400ms and 800ms.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retry.min(16))
    }

    /// Run `query` until it succeeds, fails with a final error, or the
    /// retries are spent. The last error is returned as is.
    pub async fn run<T, F, Fut>(&self, method: &str, mut query: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut retry = 0;
        loop {
            match query().await {
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    let delay = self.delay(retry);
                    retry += 1;
                    tracing::warn!(
                        method,
                        retry,
                        max_retries = self.max_retries,
                        "ledger query failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }
}
