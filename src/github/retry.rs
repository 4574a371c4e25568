use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

use crate::github::error::ApiError;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// How often a rate-limited call is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Run one logical API call, retrying only while it reports a rate limit.
///
/// Any other error is returned straight away. When every attempt was rate
/// limited the error from the last attempt is returned as-is.
pub async fn fetch_with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let retries = policy.max_attempts.saturating_sub(1);
    let strategy = FixedInterval::new(policy.backoff).take(retries);
    let backoff = policy.backoff;

    RetryIf::spawn(strategy, operation, |err: &ApiError| {
        if err.is_rate_limited() {
            tracing::debug!("{}; waiting {:?} before retrying", err, backoff);
            true
        } else {
            false
        }
    })
    .await
}
