use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::types::Pipeline;

/// Number of most recent pipelines kept when nothing else is configured.
pub const DEFAULT_KEEP_COUNT: usize = 50;

/// Retention rules for one pruning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionArgs {
    /// Most recent finished pipelines that always survive.
    pub keep_count: Option<usize>,
    /// Only pipelines created more than this many days ago may go.
    pub older_than_days: Option<u32>,
    pub dry_run: bool,
}

/// Picks the pipelines that may be deleted.
///
/// 1. only finished pipelines (success, failed, canceled) are candidates
/// 2. candidates are ordered by id, highest first
/// 3. the first `keep_count` candidates survive
/// 4. with `older_than_days`, a candidate must also have been created
///    strictly before `now - older_than_days`
///
/// Count and age rules must both allow a deletion. The result is sorted by
/// ascending id, which is the order deletions are issued in.
pub fn select_for_deletion(
    pipelines: &[Pipeline],
    args: &RetentionArgs,
    now: DateTime<Utc>,
) -> Vec<Pipeline> {
    let mut candidates: Vec<&Pipeline> = pipelines
        .iter()
        .filter(|pipeline| pipeline.status.is_terminal())
        .collect();
    candidates.sort_by(|a, b| b.id.cmp(&a.id));

    let keep = args.keep_count.unwrap_or(0);
    let cutoff = args.older_than_days.map(|days| {
        now.checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    });

    let mut selected: Vec<Pipeline> = candidates
        .into_iter()
        .skip(keep)
        .filter(|pipeline| match cutoff {
            Some(cutoff) => pipeline
                .created_at
                .is_some_and(|created_at| created_at < cutoff),
            None => true,
        })
        .cloned()
        .collect();

    selected.sort_by_key(|pipeline| pipeline.id);
    selected
}
