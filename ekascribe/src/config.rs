//! Settings for the command-line driver: an optional JSON file merged with
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::clients::{ClientConfig, Credentials, PollConfig, DEFAULT_UPLOAD_ACTION};

pub const DEFAULT_SETTINGS_FILE: &str = "ekascribe.json";

pub const ENV_CLIENT_ID: &str = "EKA_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "EKA_CLIENT_SECRET";
pub const ENV_BASE_URL: &str = "EKA_BASE_URL";
pub const ENV_SHARING_KEY: &str = "EKA_SHARING_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Missing {field}: set {env} or `{key}` in the settings file")]
    Missing {
        field: &'static str,
        env: &'static str,
        key: &'static str,
    },
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings file contents (stored locally)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSettings {
    #[serde(alias = "client_id")]
    pub client_id: Option<String>,
    #[serde(alias = "client_secret")]
    pub client_secret: Option<String>,
    #[serde(alias = "base_url")]
    pub base_url: Option<String>,
    #[serde(alias = "sharing_key")]
    pub sharing_key: Option<String>,
    #[serde(alias = "user_agent")]
    pub user_agent: Option<String>,
    #[serde(alias = "upload_action")]
    pub upload_action: Option<String>,
    #[serde(alias = "request_timeout_secs")]
    pub request_timeout_secs: Option<u64>,
    #[serde(alias = "poll_interval_secs")]
    pub poll_interval_secs: Option<u64>,
    #[serde(alias = "max_poll_duration_secs")]
    pub max_poll_duration_secs: Option<u64>,
}

impl FileSettings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Everything needed to run a workflow
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub credentials: Credentials,
    pub sharing_key: Option<String>,
    pub upload_action: String,
    pub poll: PollConfig,
}

impl Settings {
    /// Load settings from `path`, or from `ekascribe.json` in the working
    /// directory when it exists, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => FileSettings::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.is_file() {
                    FileSettings::from_file(default_path)?
                } else {
                    FileSettings::default()
                }
            }
        };

        Self::from_sources(file, |name| std::env::var(name).ok())
    }

    /// Merge file settings with variables from `env`. Non-empty variables win.
    pub fn from_sources(
        file: FileSettings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let client_id = env(ENV_CLIENT_ID)
            .or(file.client_id)
            .ok_or(ConfigError::Missing {
                field: "client id",
                env: ENV_CLIENT_ID,
                key: "clientId",
            })?;
        let client_secret = env(ENV_CLIENT_SECRET)
            .or(file.client_secret)
            .ok_or(ConfigError::Missing {
                field: "client secret",
                env: ENV_CLIENT_SECRET,
                key: "clientSecret",
            })?;

        let mut client = ClientConfig::default();
        if let Some(base_url) = env(ENV_BASE_URL).or(file.base_url) {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    field: "base url",
                    reason: format!("{} is not an http(s) url", base_url),
                });
            }
            client.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(user_agent) = file.user_agent {
            client.user_agent = user_agent;
        }
        if let Some(secs) = file.request_timeout_secs {
            client.request_timeout = positive_secs("request timeout", secs)?;
        }

        let mut poll = PollConfig::default();
        if let Some(secs) = file.poll_interval_secs {
            poll.interval = positive_secs("poll interval", secs)?;
        }
        if let Some(secs) = file.max_poll_duration_secs {
            poll.max_duration = positive_secs("max poll duration", secs)?;
        }

        Ok(Self {
            client,
            credentials: Credentials::new(client_id, client_secret),
            sharing_key: env(ENV_SHARING_KEY).or(file.sharing_key),
            upload_action: file
                .upload_action
                .unwrap_or_else(|| DEFAULT_UPLOAD_ACTION.to_string()),
            poll,
        })
    }
}

fn positive_secs(field: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be at least one second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
