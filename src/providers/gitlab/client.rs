mod core;
mod pagination;
mod pipelines;
mod projects;
mod retry;

pub use self::core::{GitLabClient, GitLabInstance, HttpSettings, DEFAULT_TIMEOUT};
pub use self::retry::{
    RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_STATUSES, DEFAULT_RETRY_DELAY,
};
