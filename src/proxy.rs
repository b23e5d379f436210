use log::debug;
use reqwest::{NoProxy, Proxy};
use url::Url;

use crate::error::{GitLabToolsError, Result};

pub const HTTP_PROXY: &str = "http_proxy";
pub const HTTPS_PROXY: &str = "https_proxy";
pub const NO_PROXY: &str = "no_proxy";
const NO_PROXY_DELIMITERS: [char; 2] = [',', ';'];

/// Outbound proxy configuration resolved from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    pub proxy_url: Option<Url>,
    pub no_proxy: Vec<String>,
}

impl ProxySettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves settings through `lookup` so callers (and tests) control the
    /// variable source. Lower-case names win over upper-case ones.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).or_else(|| lookup(&name.to_uppercase()));

        let proxy_url = [HTTP_PROXY, HTTPS_PROXY]
            .into_iter()
            .filter_map(|name| read(name))
            .find_map(|value| parse_proxy_url(&value));

        let mut no_proxy: Vec<String> = Vec::new();
        if let Some(value) = read(NO_PROXY) {
            for entry in value
                .split(NO_PROXY_DELIMITERS)
                .map(|entry| entry.trim().to_lowercase())
                .filter(|entry| !entry.is_empty())
            {
                if !no_proxy.contains(&entry) {
                    no_proxy.push(entry);
                }
            }
        }

        Self {
            proxy_url,
            no_proxy,
        }
    }

    /// Converts the settings into a `reqwest` proxy, `None` when no proxy is
    /// configured.
    pub fn to_reqwest_proxy(&self) -> Result<Option<Proxy>> {
        let Some(proxy_url) = &self.proxy_url else {
            return Ok(None);
        };

        debug!(
            "Using proxy {proxy_url} (bypass: [{}])",
            self.no_proxy.join(", ")
        );

        let proxy = Proxy::all(proxy_url.as_str())
            .map_err(|e| GitLabToolsError::Config(format!("Invalid proxy {proxy_url}: {e}")))?;

        Ok(Some(
            proxy.no_proxy(NoProxy::from_string(&self.no_proxy.join(","))),
        ))
    }
}

fn parse_proxy_url(value: &str) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Url::parse(value)
        .ok()
        .filter(|url| url.has_host())
}
