use url::Url;

use crate::auth::Token;
use crate::error::{GitLabToolsError, Result};
use crate::providers::gitlab::PruneTarget;

/// Long names of the command line arguments, as shown in error messages.
pub const ARG_URL: &str = "--url";
pub const ARG_TOKEN: &str = "--token";
pub const ARG_PROJECT_ID: &str = "--project-id";
pub const ARG_GROUP_ID: &str = "--group-id";
pub const ARG_KEEP: &str = "--keep";
pub const ARG_OLDER_THAN_DAYS: &str = "--older-than-days";

pub const PROJECT_ID_MIN_VALUE: i64 = 1;
pub const GROUP_ID_MIN_VALUE: i64 = 1;

/// Accepts absolute `http` and `https` URLs only.
pub fn validate_url(value: &str) -> Result<Url> {
    let invalid = || GitLabToolsError::Validation(format!("{ARG_URL} is not a valid url"));
    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(invalid()),
    }
}

pub fn validate_token(value: Option<&str>) -> Result<Token> {
    match value.map(Token::from) {
        Some(token) if !token.is_blank() => Ok(token),
        _ => Err(GitLabToolsError::Validation(format!(
            "{ARG_TOKEN} is not set"
        ))),
    }
}

pub fn validate_project_id(value: i64) -> Result<u64> {
    validate_id(value, PROJECT_ID_MIN_VALUE, ARG_PROJECT_ID, "project")
}

pub fn validate_group_id(value: i64) -> Result<u64> {
    validate_id(value, GROUP_ID_MIN_VALUE, ARG_GROUP_ID, "group")
}

fn validate_id(value: i64, min: i64, arg: &str, kind: &str) -> Result<u64> {
    if value < min {
        return Err(GitLabToolsError::Validation(format!(
            "{arg} is not a valid {kind} id"
        )));
    }
    u64::try_from(value)
        .map_err(|_| GitLabToolsError::Validation(format!("{arg} is not a valid {kind} id")))
}

/// Exactly one of project id and group id must be given.
pub fn validate_target(project_id: Option<i64>, group_id: Option<i64>) -> Result<PruneTarget> {
    let project_id = project_id.map(validate_project_id).transpose()?;
    let group_id = group_id.map(validate_group_id).transpose()?;
    match (project_id, group_id) {
        (Some(id), None) => Ok(PruneTarget::Project(id)),
        (None, Some(id)) => Ok(PruneTarget::Group(id)),
        _ => Err(GitLabToolsError::Validation(format!(
            "Either {ARG_PROJECT_ID} or {ARG_GROUP_ID} have to have a valid value"
        ))),
    }
}

pub fn validate_keep(value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| GitLabToolsError::Validation(format!("{ARG_KEEP} is less than 0")))
}

pub fn validate_older_than_days(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        GitLabToolsError::Validation(format!(
            "{ARG_OLDER_THAN_DAYS} must be between 0 and {}",
            u32::MAX
        ))
    })
}
