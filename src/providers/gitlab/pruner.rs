use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use tokio_util::sync::CancellationToken;

use super::client::{GitLabClient, GitLabInstance};
use super::retention::{select_for_deletion, RetentionArgs};
use super::types::{Group, Pipeline, Project};
use crate::error::{GitLabToolsError, Result};
use crate::report::{ProjectReport, PruneReport};

/// The slice of the GitLab API the pruner needs.
#[async_trait]
pub trait GitLabApi: Send + Sync {
    async fn read_project(
        &self,
        instance: &GitLabInstance,
        project_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<Project>>;

    async fn read_group(
        &self,
        instance: &GitLabInstance,
        group_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<Group>>;

    async fn list_pipelines(
        &self,
        instance: &GitLabInstance,
        project_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Pipeline>>;

    async fn delete_pipelines(
        &self,
        instance: &GitLabInstance,
        project: &Project,
        pipelines: &[Pipeline],
        cancel: &CancellationToken,
    ) -> Result<()>;
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn read_project(
        &self,
        instance: &GitLabInstance,
        project_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<Project>> {
        GitLabClient::read_project(self, instance, project_id, cancel).await
    }

    async fn read_group(
        &self,
        instance: &GitLabInstance,
        group_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<Group>> {
        GitLabClient::read_group(self, instance, group_id, cancel).await
    }

    async fn list_pipelines(
        &self,
        instance: &GitLabInstance,
        project_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Pipeline>> {
        GitLabClient::list_pipelines(self, instance, project_id, cancel).await
    }

    async fn delete_pipelines(
        &self,
        instance: &GitLabInstance,
        project: &Project,
        pipelines: &[Pipeline],
        cancel: &CancellationToken,
    ) -> Result<()> {
        GitLabClient::delete_pipelines(self, instance, project, pipelines, cancel).await
    }
}

/// Receives progress events from [`PipelinePruner::prune`].
///
/// Every method defaults to a no-op; `()` ignores all events.
pub trait PruneObserver {
    /// The target resolved to `count` projects.
    fn targets_resolved(&mut self, _count: usize) {}

    fn project_started(&mut self, _name: &str) {}

    fn project_finished(&mut self) {}

    /// All `processed` projects were pruned.
    fn finished(&mut self, _processed: usize) {}

    /// The run stopped early on an error or cancellation.
    fn aborted(&mut self) {}
}

impl PruneObserver for () {}

/// What to prune: one project or every project of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneTarget {
    Project(u64),
    Group(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PruneOutcome {
    Completed(PruneReport),
    /// The requested project or group does not exist.
    TargetNotFound,
}

/// Applies retention rules to the pipelines of one project or group.
///
/// Projects are handled strictly one after another. The first failure
/// aborts the run; later projects are left untouched.
pub struct PipelinePruner<'a, A: ?Sized> {
    api: &'a A,
    instance: &'a GitLabInstance,
}

impl<'a, A: GitLabApi + ?Sized> PipelinePruner<'a, A> {
    pub fn new(api: &'a A, instance: &'a GitLabInstance) -> Self {
        Self { api, instance }
    }

    /// Runs a full pruning pass.
    ///
    /// # Arguments
    ///
    /// * `target` - Project or group whose pipelines are pruned
    /// * `retention` - Keep count, age limit and dry-run switch
    /// * `now` - Reference time for the age limit
    /// * `cancel` - Aborts pagination and the deletion loop when fired
    /// * `observer` - Notified as projects are resolved and pruned
    ///
    /// # Errors
    ///
    /// The first transport failure, or `Cancelled`.
    pub async fn prune(
        &self,
        target: PruneTarget,
        retention: &RetentionArgs,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
        observer: &mut dyn PruneObserver,
    ) -> Result<PruneOutcome> {
        if retention.dry_run {
            info!("Dry run enabled - no changes will be made");
        }

        let Some(projects) = self.resolve_targets(target, cancel).await? else {
            return Ok(PruneOutcome::TargetNotFound);
        };

        observer.targets_resolved(projects.len());
        let mut reports = Vec::with_capacity(projects.len());
        for (project_id, project) in &projects {
            if cancel.is_cancelled() {
                observer.aborted();
                return Err(GitLabToolsError::Cancelled);
            }
            observer.project_started(project.display_name());
            match self
                .prune_project(*project_id, project, retention, now, cancel)
                .await
            {
                Ok(report) => reports.push(report),
                Err(e) => {
                    observer.aborted();
                    return Err(e);
                }
            }
            observer.project_finished();
        }
        observer.finished(reports.len());

        Ok(PruneOutcome::Completed(PruneReport {
            instance: self.instance.base_url().to_string(),
            generated_at: now,
            retention: *retention,
            projects: reports,
        }))
    }

    /// `None` when the project or group does not exist, otherwise the
    /// projects to prune (possibly none) paired with their ids.
    async fn resolve_targets(
        &self,
        target: PruneTarget,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<(u64, Project)>>> {
        match target {
            PruneTarget::Group(group_id) => {
                let Some(group) = self.api.read_group(self.instance, group_id, cancel).await?
                else {
                    warn!("Group with id '{group_id}' could not be found");
                    return Ok(None);
                };

                let projects: Vec<(u64, Project)> = group
                    .projects
                    .into_iter()
                    .filter_map(|project| project.id.map(|id| (id, project)))
                    .collect();

                if projects.is_empty() {
                    warn!("Group with id '{group_id}' has no projects");
                }
                Ok(Some(projects))
            }
            PruneTarget::Project(project_id) => {
                let Some(project) = self
                    .api
                    .read_project(self.instance, project_id, cancel)
                    .await?
                else {
                    warn!("Project with id '{project_id}' could not be found");
                    return Ok(None);
                };

                trace!(
                    "Found project with id '{project_id}' (name: '{}', url to repo: '{}')",
                    project.display_name(),
                    project.http_url_to_repo.as_deref().unwrap_or_default()
                );
                Ok(Some(vec![(project_id, project)]))
            }
        }
    }

    async fn prune_project(
        &self,
        project_id: u64,
        project: &Project,
        retention: &RetentionArgs,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ProjectReport> {
        let name = project.display_name();
        let pipelines = self
            .api
            .list_pipelines(self.instance, project_id, cancel)
            .await?;
        let selected = select_for_deletion(&pipelines, retention, now);

        debug!(
            "{} pipelines exist and {} should be deleted for project id '{project_id}' ('{name}')",
            pipelines.len(),
            selected.len()
        );

        let mut deleted = 0;
        if selected.is_empty() {
            info!(
                "0 out of {} pipelines to delete for project id '{project_id}' ('{name}'), nothing to do",
                pipelines.len()
            );
        } else {
            info!(
                "{} out of {} pipelines to delete for project id '{project_id}' ('{name}')",
                selected.len(),
                pipelines.len()
            );
            if !retention.dry_run {
                info!("Deleting {} pipelines...", selected.len());
                let mut target = project.clone();
                target.id = Some(project_id);
                self.api
                    .delete_pipelines(self.instance, &target, &selected, cancel)
                    .await?;
                deleted = selected.len();
                info!("{deleted} pipelines deleted for project id '{project_id}' ('{name}')");
            }
        }

        Ok(ProjectReport {
            project_id,
            project_name: name.to_string(),
            total_pipelines: pipelines.len(),
            selected_pipeline_ids: selected.iter().map(|p| p.id).collect(),
            deleted_pipelines: deleted,
        })
    }
}
