use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{GitLabToolsError, Result};
use crate::output::{print_prune_report, write_json, PruneProgress};
use crate::providers::gitlab::{
    GitLabClient, GitLabInstance, HttpSettings, PipelinePruner, PruneOutcome, RetentionArgs,
    RetryPolicy,
};
use crate::proxy::ProxySettings;
use crate::validation::{
    validate_group_id, validate_keep, validate_older_than_days, validate_project_id,
    validate_target, validate_token, validate_url,
};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCodeType {
    Ok = 0,
    UnexpectedError = 1,
    IllegalArguments = 2,
}

impl ExitCodeType {
    pub fn from_error(error: &GitLabToolsError) -> Self {
        if error.is_illegal_arguments() {
            Self::IllegalArguments
        } else {
            Self::UnexpectedError
        }
    }
}

impl From<ExitCodeType> for ExitCode {
    fn from(code: ExitCodeType) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser)]
#[command(name = "gitlab-tools")]
#[command(author, version, about = "Pipeline housekeeping for GitLab", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GitLab instance base URL
    #[arg(short, long, global = true, env = "GITLAB_URL")]
    url: Option<String>,

    /// Personal access token
    #[arg(short = 'a', long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Configuration file (toml, json or yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Per request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Retries after a transient failure; 0 disables retrying
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Write JSON to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete old pipelines of a project or of every project of a group
    #[command(visible_alias = "dp")]
    DeletePipelines {
        #[arg(short = 'P', long, allow_negative_numbers = true)]
        project_id: Option<i64>,

        #[arg(short, long, allow_negative_numbers = true)]
        group_id: Option<i64>,

        /// Number of most recent finished pipelines to keep
        #[arg(short, long, allow_negative_numbers = true)]
        keep: Option<i64>,

        /// Only delete pipelines created more than this many days ago
        #[arg(short = 'O', long, allow_negative_numbers = true)]
        older_than_days: Option<i64>,

        /// Report what would be deleted without deleting anything
        #[arg(short, long, default_value_t = false)]
        dry_run: bool,
    },

    /// Print a project as JSON
    #[command(visible_alias = "rp")]
    ReadProject {
        #[arg(short = 'P', long, allow_negative_numbers = true)]
        project_id: i64,
    },

    /// Print a group as JSON
    #[command(visible_alias = "rg")]
    ReadGroup {
        #[arg(short, long, allow_negative_numbers = true)]
        group_id: i64,
    },
}

impl Cli {
    pub async fn execute(&self, cancel: &CancellationToken) -> Result<ExitCodeType> {
        let config = Config::load(self.config.as_deref())
            .map_err(|e| GitLabToolsError::Config(format!("{e:#}")))?;
        let instance = self.resolve_instance(&config)?;

        match &self.command {
            Commands::DeletePipelines {
                project_id,
                group_id,
                keep,
                older_than_days,
                dry_run,
            } => {
                let target = validate_target(*project_id, *group_id)?;
                let retention = RetentionArgs {
                    keep_count: Some(match keep {
                        Some(keep) => validate_keep(*keep)?,
                        None => config.retention.keep,
                    }),
                    older_than_days: match older_than_days {
                        Some(days) => Some(validate_older_than_days(*days)?),
                        None => config.retention.older_than_days,
                    },
                    dry_run: *dry_run,
                };
                let client = GitLabClient::new(&self.http_settings(&config))?;

                info!("Deleting old pipelines of {target:?}");
                let mut progress = PruneProgress::default();
                let outcome = PipelinePruner::new(&client, &instance)
                    .prune(target, &retention, Utc::now(), cancel, &mut progress)
                    .await?;

                match outcome {
                    PruneOutcome::TargetNotFound => Ok(ExitCodeType::IllegalArguments),
                    PruneOutcome::Completed(report) => {
                        print_prune_report(&report);
                        if let Some(path) = &self.output {
                            write_json(&report, self.pretty, Some(path))?;
                            info!("Report written to: {}", path.display());
                        }
                        Ok(ExitCodeType::Ok)
                    }
                }
            }
            Commands::ReadProject { project_id } => {
                let project_id = validate_project_id(*project_id)?;
                let client = GitLabClient::new(&self.http_settings(&config))?;
                match client.read_project(&instance, project_id, cancel).await? {
                    Some(project) => {
                        self.emit(&project)?;
                        Ok(ExitCodeType::Ok)
                    }
                    None => {
                        warn!("Project with id '{project_id}' could not be found");
                        Ok(ExitCodeType::IllegalArguments)
                    }
                }
            }
            Commands::ReadGroup { group_id } => {
                let group_id = validate_group_id(*group_id)?;
                let client = GitLabClient::new(&self.http_settings(&config))?;
                match client.read_group(&instance, group_id, cancel).await? {
                    Some(group) => {
                        self.emit(&group)?;
                        Ok(ExitCodeType::Ok)
                    }
                    None => {
                        warn!("Group with id '{group_id}' could not be found");
                        Ok(ExitCodeType::IllegalArguments)
                    }
                }
            }
        }
    }

    fn emit<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        write_json(value, self.pretty, self.output.as_deref())?;
        if let Some(path) = &self.output {
            info!("Output written to: {}", path.display());
        }
        Ok(())
    }

    /// Command line (or environment) first, then the config file.
    fn resolve_instance(&self, config: &Config) -> Result<GitLabInstance> {
        let url = validate_url(self.url.as_deref().unwrap_or(&config.gitlab.base_url))?;
        let token = validate_token(self.token.as_deref().or(config.gitlab.token.as_deref()))?;
        GitLabInstance::new(url.as_str(), token)
    }

    fn http_settings(&self, config: &Config) -> HttpSettings {
        let retry = RetryPolicy::new(self.max_retries.unwrap_or(config.retry.max_retries))
            .with_retryable_statuses(config.retry.statuses.iter().copied())
            .with_fixed_delay(Duration::from_millis(config.retry.delay_ms));
        HttpSettings {
            timeout: Duration::from_secs(self.timeout.unwrap_or(config.gitlab.timeout_secs)),
            proxy: ProxySettings::from_env(),
            retry,
        }
    }
}
