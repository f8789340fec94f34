use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StatlensError;

pub const API_URL_ENV: &str = "STATLENS_API_URL";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const CONFIG_FILE_NAME: &str = "statlens.json";

/// On-disk shape of `statlens.json`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub search_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// `None` means requests never time out.
    pub timeout: Option<Duration>,
    pub search_limit: u32,
}

impl ClientConfig {
    pub fn with_base_url(base_url: &str) -> Result<Self, StatlensError> {
        Ok(Self {
            base_url: validate_base_url(base_url)?,
            ..Self::default()
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolves the client configuration: `STATLENS_API_URL` wins over the
    /// config file, which wins over the built-in localhost fallback.
    pub fn resolve(path: Option<&str>) -> Result<ClientConfig, StatlensError> {
        let config = Self::load_file(path)?;
        let env_url = std::env::var(API_URL_ENV).ok();
        Self::resolve_config(config, env_url)
    }

    pub fn resolve_config(
        config: Config,
        env_url: Option<String>,
    ) -> Result<ClientConfig, StatlensError> {
        let base_url = env_url
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or(config.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(ClientConfig {
            base_url: validate_base_url(&base_url)?,
            timeout: config.timeout_secs.map(Duration::from_secs),
            search_limit: config.search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        })
    }

    fn load_file(path: Option<&str>) -> Result<Config, StatlensError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => match default_config_paths()
                .into_iter()
                .find(|candidate| candidate.as_std_path().exists())
            {
                Some(found) => found,
                None => return Ok(Config::default()),
            },
        };
        debug!(path = %config_path, "loading config file");

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| StatlensError::ConfigRead(PathBuf::from(config_path.as_str())))?;
        serde_json::from_str(&content).map_err(|err| StatlensError::ConfigParse(err.to_string()))
    }
}

fn default_config_paths() -> Vec<Utf8PathBuf> {
    let mut paths = vec![Utf8PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dirs) = ProjectDirs::from("", "", "statlens")
        && let Ok(dir) = Utf8PathBuf::from_path_buf(dirs.config_dir().to_path_buf())
    {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Checks that `base` is an absolute http(s) URL and strips trailing slashes.
pub fn validate_base_url(base: &str) -> Result<String, StatlensError> {
    let trimmed = base.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|err| StatlensError::InvalidBaseUrl(format!("{base}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StatlensError::InvalidBaseUrl(format!(
            "{base}: unsupported scheme {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(StatlensError::InvalidBaseUrl(format!("{base}: missing host")));
    }
    Ok(trimmed.to_string())
}
