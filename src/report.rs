use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::gitlab::RetentionArgs;

/// Outcome of one `delete-pipelines` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneReport {
    pub instance: String,
    pub generated_at: DateTime<Utc>,
    pub retention: RetentionArgs,
    pub projects: Vec<ProjectReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_id: u64,
    pub project_name: String,
    pub total_pipelines: usize,
    /// Ids selected by the retention rules, in deletion order.
    pub selected_pipeline_ids: Vec<u64>,
    /// Zero on dry runs.
    pub deleted_pipelines: usize,
}

impl PruneReport {
    pub fn total_selected(&self) -> usize {
        self.projects
            .iter()
            .map(|p| p.selected_pipeline_ids.len())
            .sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.projects.iter().map(|p| p.deleted_pipelines).sum()
    }
}
