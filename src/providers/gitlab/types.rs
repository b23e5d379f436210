use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A GitLab project as returned by `GET /api/v4/projects/{id}`.
///
/// Every field is optional on the wire; `id` is the identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub name_with_namespace: Option<String>,
    pub description: Option<String>,
    pub path: Option<String>,
    pub path_with_namespace: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub default_branch: Option<String>,
    #[serde(default)]
    pub tag_list: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub ssh_url_to_repo: Option<String>,
    pub http_url_to_repo: Option<String>,
    pub web_url: Option<String>,
    pub empty_repo: Option<bool>,
    pub archived: Option<bool>,
    pub visibility: Option<String>,
}

impl Project {
    /// Name used in log lines and reports.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// A GitLab group as returned by `GET /api/v4/groups/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub full_name: Option<String>,
    pub full_path: Option<String>,
    pub description: Option<String>,
    pub web_url: Option<String>,
    pub parent_id: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub visibility: Option<String>,
    /// Only present when GitLab embeds the group's projects.
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Lifecycle status of a pipeline.
///
/// GitLab knows more statuses than the five the retention rules care about;
/// those are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Other(String),
}

impl PipelineStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "success" => Self::Success,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Whether the run has finished and may be pruned.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PipelineStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Pipeline entry exactly as GitLab lists it.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PipelineRecord {
    pub id: Option<u64>,
    pub iid: Option<u64>,
    pub project_id: Option<u64>,
    pub status: Option<String>,
    #[serde(rename = "ref")]
    pub ref_: Option<String>,
    pub web_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A validated CI pipeline: it always has an id and a status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    pub id: u64,
    pub iid: Option<u64>,
    pub project_id: Option<u64>,
    pub status: PipelineStatus,
    #[serde(rename = "ref")]
    pub ref_: Option<String>,
    pub web_url: Option<String>,
    /// Authoritative for age calculations, already normalized to UTC.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Pipeline {
    /// Minimal pipeline, mostly useful for building fixtures.
    pub fn new(id: u64, status: PipelineStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            iid: None,
            project_id: None,
            status,
            ref_: None,
            web_url: None,
            created_at: Some(created_at),
            updated_at: None,
        }
    }
}

impl PipelineRecord {
    /// Drops records without an id or a non-blank status.
    pub(crate) fn into_pipeline(self) -> Option<Pipeline> {
        let id = self.id?;
        let status = self.status.filter(|s| !s.trim().is_empty())?;
        Some(Pipeline {
            id,
            iid: self.iid,
            project_id: self.project_id,
            status: PipelineStatus::parse(&status),
            ref_: self.ref_,
            web_url: self.web_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
