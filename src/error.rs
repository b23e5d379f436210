use std::fmt;

use reqwest::{Method, StatusCode};
use thiserror::Error;
use url::Url;

/// Why a GitLab request failed.
///
/// Only `Status` carries information the retry policy and the entity readers
/// branch on; the other variants are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The per-attempt timeout elapsed.
    Timeout,
    /// GitLab answered with a non-2xx status code.
    Status(u16),
    /// The request never produced a response (DNS, TLS, refused, ...).
    Connection(String),
    /// The response arrived but its body could not be decoded.
    Decode(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Status(code) => write!(f, "HTTP status {code}"),
            Self::Connection(detail) => write!(f, "connection failure: {detail}"),
            Self::Decode(detail) => write!(f, "invalid response body: {detail}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum GitLabToolsError {
    #[error("GitLab request failed: {message}")]
    RequestFailed { message: String, cause: FailureCause },

    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitLabToolsError {
    /// Builds a `RequestFailed` whose message carries everything an operator
    /// needs to diagnose the call.
    pub fn request_failed(
        method: &Method,
        url: &Url,
        cause: FailureCause,
        body: Option<&str>,
    ) -> Self {
        let message = match (&cause, body) {
            (FailureCause::Timeout, _) => format!("Timeout reached when calling {method} {url}"),
            (FailureCause::Status(code), Some(body)) => format!(
                "Unexpected status {} returned from {method} {url}\nHttpResponse: {body}",
                describe_status(*code)
            ),
            (FailureCause::Status(code), None) => format!(
                "Unexpected status {} returned from {method} {url}",
                describe_status(*code)
            ),
            (cause, _) => format!("{method} {url} failed: {cause}"),
        };
        Self::RequestFailed { message, cause }
    }

    /// Maps a `reqwest` error raised before or while receiving a response.
    pub fn from_transport(method: &Method, url: &Url, error: &reqwest::Error) -> Self {
        let cause = if error.is_timeout() {
            FailureCause::Timeout
        } else if error.is_decode() {
            FailureCause::Decode(error.to_string())
        } else {
            FailureCause::Connection(error.to_string())
        };
        Self::request_failed(method, url, cause, None)
    }

    /// HTTP status of a failed request, if GitLab answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed {
                cause: FailureCause::Status(code),
                ..
            } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed {
                cause: FailureCause::Timeout,
                ..
            }
        )
    }

    /// Whether the failure stems from the caller's input rather than from
    /// GitLab or the environment.
    pub fn is_illegal_arguments(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Config(_))
    }
}

fn describe_status(code: u16) -> String {
    match StatusCode::from_u16(code) {
        Ok(status) => status.to_string(),
        Err(_) => code.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, GitLabToolsError>;
