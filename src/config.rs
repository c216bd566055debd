//! Base URL, API keys and pipeline settings, read from a JSON file, the
//! process environment, or AWS Secrets Manager.

use std::collections::BTreeMap;
use std::path::PathBuf;

use aws_config::BehaviorVersion;
use reqwest::Url;
use serde::Deserialize;

use crate::errors::Error;
use crate::interceptor::RetryPolicy;
use crate::token::{DEFAULT_REFRESH_HEADER, DEFAULT_REISSUE_PATH, FileTokenStore};

const ENV_PREFIX: &str = "POPUP_";
const API_KEY_PREFIX: &str = "POPUP_API_KEY_";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
    #[serde(default = "default_reissue_path")]
    pub reissue_path: String,
    #[serde(default = "default_refresh_header")]
    pub refresh_header: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub refresh_ahead_secs: Option<u64>,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default, rename = "retry")]
    pub retry_policy: RetryPolicy,
}

fn default_reissue_path() -> String {
    DEFAULT_REISSUE_PATH.to_string()
}

fn default_refresh_header() -> String {
    DEFAULT_REFRESH_HEADER.to_string()
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_keys: BTreeMap::new(),
            reissue_path: default_reissue_path(),
            refresh_header: default_refresh_header(),
            request_timeout_secs: None,
            refresh_ahead_secs: None,
            token_file: None,
            retry_policy: RetryPolicy::ReissueOnce,
        }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read '{}': {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, Error> {
        serde_json::from_str(contents)
            .map_err(|e| Error::Config(format!("Invalid config JSON: {e}")))
    }

    /// Reads `POPUP_*` variables; `POPUP_BASE_URL` is required.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(std::env::vars())
    }

    pub(crate) fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        let base_url = vars
            .get("POPUP_BASE_URL")
            .cloned()
            .ok_or_else(|| Error::Config("Missing POPUP_BASE_URL env var".to_string()))?;
        let mut config = Config::new(base_url);
        config.api_keys = vars
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(API_KEY_PREFIX)
                    .map(|name| (name.to_lowercase(), v.clone()))
            })
            .collect();
        if let Some(path) = vars.get("POPUP_REISSUE_PATH") {
            config.reissue_path = path.clone();
        }
        if let Some(header) = vars.get("POPUP_REFRESH_HEADER") {
            config.refresh_header = header.clone();
        }
        config.request_timeout_secs = parse_secs(&vars, "POPUP_REQUEST_TIMEOUT_SECS")?;
        config.refresh_ahead_secs = parse_secs(&vars, "POPUP_REFRESH_AHEAD_SECS")?;
        config.token_file = vars.get("POPUP_TOKEN_FILE").map(PathBuf::from);
        if let Some(mode) = vars.get("POPUP_RETRY") {
            config.retry_policy = match mode.as_str() {
                "never" => RetryPolicy::Never,
                "reissue_once" => RetryPolicy::ReissueOnce,
                other => {
                    return Err(Error::Config(format!(
                        "Unknown POPUP_RETRY '{other}'; expected 'never' or 'reissue_once'"
                    )));
                }
            };
        }
        Ok(config)
    }

    /// Loads the JSON config stored in the secret named by `secret_id`.
    pub async fn from_secret(secret_id: &str) -> Result<Self, Error> {
        let client = aws_sdk_secretsmanager::Client::new(
            &aws_config::load_defaults(BehaviorVersion::latest()).await,
        );
        let resp = client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| Error::Config(format!("Failed to get secret: {}", e)))?;
        let secret = resp
            .secret_string()
            .ok_or_else(|| Error::Config("Failed to get secret string, returned None".to_string()))?;
        Self::from_json(secret)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn api_key(&self, name: &str) -> Result<&str, Error> {
        self.api_keys
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Config(format!("Missing API key '{name}'")))
    }

    /// Persistent store at `token_file`, when one is configured.
    pub fn file_token_store(&self) -> Option<FileTokenStore> {
        self.token_file.as_ref().map(FileTokenStore::new)
    }

    /// Checks the base URL before any network call is made.
    pub fn validate(&self) -> Result<(), Error> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            Error::Config(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Invalid base URL '{}': scheme must be http or https",
                self.base_url
            )));
        }
        if self.reissue_path.contains("://") {
            return Err(Error::Config(format!(
                "Reissue path '{}' must be relative",
                self.reissue_path
            )));
        }
        Ok(())
    }
}

fn parse_secs(vars: &BTreeMap<String, String>, key: &str) -> Result<Option<u64>, Error> {
    vars.get(key)
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| Error::Config(format!("{key} must be a whole number of seconds")))
        })
        .transpose()
}
