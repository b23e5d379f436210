use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::providers::gitlab::{
    DEFAULT_KEEP_COUNT, DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_STATUSES, DEFAULT_RETRY_DELAY,
    DEFAULT_TIMEOUT,
};

const APP_DIR: &str = "gitlab-tools";
const CANDIDATES: [&str; 4] = [
    "gitlab-tools.toml",
    "gitlab-tools.json",
    "gitlab-tools.yaml",
    "gitlab-tools.yml",
];

/// Configuration file structure for GitLab Tools.
///
/// Every value can be overridden from the command line or the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub gitlab: GitLabConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab instance base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// GitLab personal access token
    pub token: Option<String>,

    /// Per attempt HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// HTTP statuses worth another attempt
    #[serde(default = "default_statuses")]
    pub statuses: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetentionConfig {
    #[serde(default = "default_keep")]
    pub keep: usize,

    pub older_than_days: Option<u32>,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_delay_ms(),
            statuses: default_statuses(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep: default_keep(),
            older_than_days: None,
        }
    }
}

fn default_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_delay_ms() -> u64 {
    u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(u64::MAX)
}

fn default_statuses() -> Vec<u16> {
    DEFAULT_RETRYABLE_STATUSES.to_vec()
}

fn default_keep() -> usize {
    DEFAULT_KEEP_COUNT
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path (must exist)
    /// 2. ./gitlab-tools.toml, .json, .yaml, .yml
    /// 3. `<config dir>/gitlab-tools/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::load_from_path(path);
        }

        let user_dir = dirs::config_dir().map(|dir| dir.join(APP_DIR));
        match discover(Path::new("."), user_dir.as_deref()) {
            Some(found) => Self::load_from_path(&found),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

/// First existing config file in `search_dir`, then in `user_dir`.
fn discover(search_dir: &Path, user_dir: Option<&Path>) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|candidate| search_dir.join(candidate))
        .chain(user_dir.map(|dir| dir.join("config.toml")))
        .find(|path| path.is_file())
}
