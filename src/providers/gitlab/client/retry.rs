use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio_util::sync::CancellationToken;

use crate::error::{FailureCause, GitLabToolsError, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
/// 408, 500, 502, 503, 504
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [408, 500, 502, 503, 504];

/// Delay before the n-th retry (1-based).
pub type Backoff = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Bounded retries around a single HTTP attempt.
///
/// Only HTTP status failures listed in `retryable_statuses` are retried.
/// Timeouts fail fast: whatever made the server slow is unlikely to resolve
/// within the retry window.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    retryable_statuses: Vec<u16>,
    backoff: Backoff,
}

impl RetryPolicy {
    /// `max_retries = 0` means a single attempt.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            backoff: fixed_delay_after_first(DEFAULT_RETRY_DELAY),
        }
    }

    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Zero delay before the first retry, `delay` before every later one.
    pub fn with_fixed_delay(mut self, delay: Duration) -> Self {
        self.backoff = fixed_delay_after_first(delay);
        self
    }

    pub fn with_backoff(mut self, backoff: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_worth_retrying(&self, error: &GitLabToolsError) -> bool {
        match error {
            GitLabToolsError::RequestFailed {
                cause: FailureCause::Status(code),
                ..
            } => self.retryable_statuses.contains(code),
            _ => false,
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the retries are exhausted. The last error is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(GitLabToolsError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GitLabToolsError::Cancelled),
                outcome = operation() => outcome,
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) if retry < self.max_retries && self.is_worth_retrying(&error) => error,
                Err(error) => return Err(error),
            };

            retry += 1;
            let delay = (self.backoff)(retry);
            warn!(
                "{error}; retrying in {}ms ({retry}/{})",
                delay.as_millis(),
                self.max_retries
            );

            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(GitLabToolsError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("retryable_statuses", &self.retryable_statuses)
            .finish_non_exhaustive()
    }
}

fn fixed_delay_after_first(delay: Duration) -> Backoff {
    Arc::new(move |retry| if retry <= 1 { Duration::ZERO } else { delay })
}
