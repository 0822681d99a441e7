//! Configuration loading and validation.
//!
//! The config is a JSON file naming the external service endpoints,
//! credentials, per-call timeouts and retry bases. Missing URLs or
//! credentials are fatal-configuration errors: they surface here,
//! before any unit of work runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SQLite database path. Defaults to `~/.callscope/data/callscope.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    pub services: ServicesConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker threads executing pipeline units.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub auth_url: String,
    pub auth_username: String,
    pub auth_password: String,
    pub split_url: String,
    pub transcription_url: String,
    pub analysis_url: String,
    pub sentiment_url: String,
    pub storage_url: String,
    /// Optional; when absent, failure notifications are dropped.
    #[serde(default)]
    pub notification_url: Option<String>,
}

/// Per-call timeouts, in seconds. Metadata calls are short; audio
/// transfer and transcription run for minutes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub auth_secs: u64,
    pub split_secs: u64,
    pub transcription_secs: u64,
    pub analysis_secs: u64,
    pub sentiment_secs: u64,
    pub storage_secs: u64,
    pub notification_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            auth_secs: 30,
            split_secs: 300,
            transcription_secs: 300,
            analysis_secs: 30,
            sentiment_secs: 120,
            storage_secs: 30,
            notification_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per unit of work, including the first.
    pub max_attempts: u32,
    /// Backoff base for stage-level retries, in seconds.
    pub stage_base_delay_secs: u64,
    /// Backoff base for the authentication pre-step, in seconds.
    pub auth_base_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            stage_base_delay_secs: 60,
            auth_base_delay_secs: 1,
        }
    }
}

impl RetryConfig {
    pub fn stage_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.stage_base_delay_secs),
        )
    }

    pub fn auth_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.auth_base_delay_secs),
        )
    }
}

fn default_workers() -> usize {
    2
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let services = &config.services;
    let urls = [
        ("auth_url", &services.auth_url),
        ("split_url", &services.split_url),
        ("transcription_url", &services.transcription_url),
        ("analysis_url", &services.analysis_url),
        ("sentiment_url", &services.sentiment_url),
        ("storage_url", &services.storage_url),
    ];

    for (name, url) in urls {
        validate_url(name, url)?;
    }
    if let Some(ref url) = services.notification_url {
        validate_url("notification_url", url)?;
    }

    if services.auth_username.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "auth_username must not be empty".to_string(),
        });
    }
    if services.auth_password.is_empty() {
        return Err(ConfigError::Validation {
            message: "auth_password must not be empty".to_string(),
        });
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }
    if config.workers == 0 {
        return Err(ConfigError::Validation {
            message: "workers must be at least 1".to_string(),
        });
    }

    Ok(())
}

fn validate_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if url.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: format!("{} must not be empty", name),
        });
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation {
            message: format!("{} must be an http(s) URL, got '{}'", name, url),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config_json() -> String {
        r#"{
            "services": {
                "auth_url": "http://auth:8000",
                "auth_username": "orchestrator",
                "auth_password": "secret",
                "split_url": "http://split:8001",
                "transcription_url": "http://transcription:8004",
                "analysis_url": "http://analysis:8005",
                "sentiment_url": "http://sentiment:8006",
                "storage_url": "http://storage:8002",
                "notification_url": "http://notification:8003"
            }
        }"#
        .to_string()
    }

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(&minimal_config_json()).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.stage_base_delay_secs, 60);
        assert_eq!(config.retry.auth_base_delay_secs, 1);
        assert_eq!(config.timeouts.transcription_secs, 300);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_missing_service_url_rejected() {
        let json = minimal_config_json().replace("http://analysis:8005", "");
        let err = load_config_from_str(&json).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("analysis_url"));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let json = minimal_config_json().replace("http://storage:8002", "storage:8002");
        let err = load_config_from_str(&json).unwrap_err();
        assert!(err.to_string().contains("storage_url"));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let json = minimal_config_json().replace("\"secret\"", "\"\"");
        let err = load_config_from_str(&json).unwrap_err();
        assert!(err.to_string().contains("auth_password"));
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let mut json: serde_json::Value =
            serde_json::from_str(&minimal_config_json()).unwrap();
        json["retry"] = serde_json::json!({ "max_attempts": 0 });
        let err = load_config_from_str(&json.to_string()).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_retry_policies_from_config() {
        let config = load_config_from_str(&minimal_config_json()).unwrap();
        let stage = config.retry.stage_policy();
        assert_eq!(stage.max_attempts, 3);
        assert_eq!(stage.base_delay, Duration::from_secs(60));

        let auth = config.retry.auth_policy();
        assert_eq!(auth.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = load_config_from_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, minimal_config_json()).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.services.auth_username, "orchestrator");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
