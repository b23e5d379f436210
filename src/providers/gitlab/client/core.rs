use std::time::Duration;

use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::retry::RetryPolicy;
use crate::auth::Token;
use crate::error::{FailureCause, GitLabToolsError, Result};
use crate::proxy::ProxySettings;

pub const HEADER_PRIVATE_TOKEN: &str = "PRIVATE-TOKEN";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const API_PREFIX: [&str; 2] = ["api", "v4"];

/// Transport settings shared by every request of one invocation.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub proxy: ProxySettings,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            proxy: ProxySettings::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Where to send requests and how to authenticate them.
#[derive(Debug, Clone)]
pub struct GitLabInstance {
    base_url: Url,
    token: Token,
}

impl GitLabInstance {
    pub fn new(base_url: &str, token: Token) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GitLabToolsError::Config(format!("Invalid base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GitLabToolsError::Config(format!(
                "Invalid base URL: {base_url} cannot carry path segments"
            )));
        }
        Ok(Self { base_url, token })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// `{base}/api/v4/{segments...}`, each segment percent-encoded.
    pub fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| {
                GitLabToolsError::Config(format!("Invalid base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }
}

/// REST transport for the GitLab v4 API.
///
/// Holds the connection pool and the retry policy; the target instance is
/// passed per call.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    retry: RetryPolicy,
}

impl GitLabClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("gitlab-tools/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .no_proxy();

        if let Some(proxy) = settings.proxy.to_reqwest_proxy()? {
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| GitLabToolsError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            retry: settings.retry.clone(),
        })
    }

    /// Sends one logical request, retried per policy. Non-2xx responses are
    /// turned into `RequestFailed`.
    pub(super) async fn send(
        &self,
        instance: &GitLabInstance,
        method: Method,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        self.retry
            .execute(cancel, || self.attempt(instance, &method, url))
            .await
    }

    pub(super) async fn get_json<T: DeserializeOwned>(
        &self,
        instance: &GitLabInstance,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let response = self.send(instance, Method::GET, url, cancel).await?;
        decode_json(&Method::GET, url, response).await
    }

    async fn attempt(
        &self,
        instance: &GitLabInstance,
        method: &Method,
        url: &Url,
    ) -> Result<Response> {
        let response = self
            .client
            .request(method.clone(), url.clone())
            .header(HEADER_PRIVATE_TOKEN, instance.token.as_str())
            .send()
            .await
            .map_err(|e| GitLabToolsError::from_transport(method, url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(GitLabToolsError::request_failed(
                method,
                url,
                FailureCause::Status(status.as_u16()),
                Some(&body),
            ));
        }

        Ok(response)
    }
}

pub(super) async fn decode_json<T: DeserializeOwned>(
    method: &Method,
    url: &Url,
    response: Response,
) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| GitLabToolsError::from_transport(method, url, &e))?;
    serde_json::from_slice(&body).map_err(|e| {
        GitLabToolsError::request_failed(method, url, FailureCause::Decode(e.to_string()), None)
    })
}

/// Turns a 404 on a single-entity read into `None`.
pub(super) fn absent_on_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
