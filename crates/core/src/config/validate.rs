use super::{types::Config, ConfigError};

/// Validate configuration beyond what serde enforces:
/// - URLs must be http(s)
/// - timeouts must be non-zero
/// - retry/attempt caps must be at least 1
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_url("registry.base_url", &config.registry.base_url)?;
    validate_url("captcha.url", &config.captcha.url)?;
    if let Some(notifier) = &config.notifier {
        validate_url("notifier.webhook_url", &notifier.webhook_url)?;
        if notifier.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "notifier.timeout_secs cannot be 0".to_string(),
            ));
        }
    }

    if config.registry.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "registry.timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.captcha.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "captcha.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.session.max_network_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "session.max_network_attempts must be at least 1".to_string(),
        ));
    }
    if config.session.max_captcha_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "session.max_captcha_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{field} must be an http(s) URL, got {value:?}"
        )))
    }
}
