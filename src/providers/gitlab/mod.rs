mod client;
mod pruner;
mod retention;
mod types;

pub use client::{
    GitLabClient, GitLabInstance, HttpSettings, RetryPolicy, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRYABLE_STATUSES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};
pub use pruner::{PipelinePruner, PruneObserver, PruneOutcome, PruneTarget};
pub use retention::{RetentionArgs, DEFAULT_KEEP_COUNT};
