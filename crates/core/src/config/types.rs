use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::session::SessionConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub registry: RegistryConfig,
    pub captcha: CaptchaOracleConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Registry site configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Base URL of the registry's door-plate query application
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u32,
}

fn default_registry_timeout() -> u32 {
    30
}

/// Captcha OCR sidecar configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptchaOracleConfig {
    /// Sidecar URL (e.g., "http://localhost:8501")
    pub url: String,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_captcha_timeout")]
    pub timeout_secs: u32,
}

fn default_captcha_timeout() -> u32 {
    15
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("doorplate.db")
}

/// Webhook notifier configuration. The webhook URL may embed a token,
/// so it is treated as a secret.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    pub webhook_url: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u32,
}

fn default_notifier_timeout() -> u32 {
    10
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub registry: RegistryConfig,
    pub captcha: CaptchaOracleConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifier: Option<SanitizedNotifierConfig>,
    pub session: SessionConfig,
}

/// Sanitized notifier config (webhook URL hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifierConfig {
    pub webhook_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            registry: config.registry.clone(),
            captcha: config.captcha.clone(),
            database: config.database.clone(),
            notifier: config.notifier.as_ref().map(|n| SanitizedNotifierConfig {
                webhook_configured: !n.webhook_url.is_empty(),
                timeout_secs: n.timeout_secs,
            }),
            session: config.session.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[registry]
base_url = "https://registry.example.gov/doorplate"

[captcha]
url = "http://localhost:8501"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.registry.timeout_secs, 30);
        assert_eq!(config.captcha.timeout_secs, 15);
        assert_eq!(config.database.path.to_str().unwrap(), "doorplate.db");
        assert!(config.notifier.is_none());
        assert_eq!(config.session.max_captcha_attempts, 5);
    }

    #[test]
    fn test_deserialize_missing_registry_fails() {
        let toml = r#"
[captcha]
url = "http://localhost:8501"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[registry]
base_url = "https://registry.example.gov/doorplate"
timeout_secs = 60

[captcha]
url = "http://ocr:8501"

[database]
path = "/data/doorplate.db"

[notifier]
webhook_url = "https://hooks.example.com/T00/secret"
timeout_secs = 5

[session]
max_network_attempts = 4
max_captcha_attempts = 6
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.registry.timeout_secs, 60);
        assert_eq!(config.database.path.to_str().unwrap(), "/data/doorplate.db");
        assert_eq!(config.notifier.as_ref().unwrap().timeout_secs, 5);
        assert_eq!(config.session.max_network_attempts, 4);
        assert_eq!(config.session.max_captcha_attempts, 6);
        // Unset fields inside a present section still default.
        assert_eq!(config.session.retry_backoff_ms, 500);
    }

    #[test]
    fn test_sanitized_config_hides_webhook_url() {
        let toml = r#"
[registry]
base_url = "https://registry.example.gov/doorplate"

[captcha]
url = "http://localhost:8501"

[notifier]
webhook_url = "https://hooks.example.com/T00/secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
        assert!(sanitized.notifier.unwrap().webhook_configured);
    }
}
