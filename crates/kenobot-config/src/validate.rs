//! Validation of the merged configuration.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate cross-field constraints the type system cannot express.
pub(crate) fn validate(config: &Config) -> ConfigResult<()> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid(
            "server.port must be non-zero".to_string(),
        ));
    }
    if config.breaker.threshold == 0 {
        return Err(ConfigError::Invalid(
            "breaker.threshold must be at least 1".to_string(),
        ));
    }
    if config.limits.rate_window_secs == 0 {
        return Err(ConfigError::Invalid(
            "limits.rate_window_secs must be non-zero".to_string(),
        ));
    }
    if config.limits.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "limits.request_timeout_secs must be non-zero".to_string(),
        ));
    }
    if config.sleep.target_hour > 23 {
        return Err(ConfigError::Invalid(format!(
            "sleep.target_hour must be 0-23, got {}",
            config.sleep.target_hour
        )));
    }
    if config.sleep.period_hours == 0 {
        return Err(ConfigError::Invalid(
            "sleep.period_hours must be non-zero".to_string(),
        ));
    }
    if config.owner.chat_id.is_some() != config.owner.channel.is_some() {
        return Err(ConfigError::Invalid(
            "owner.chat_id and owner.channel must be set together".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_owner_fields_must_pair() {
        let mut config = Config::default();
        config.owner.chat_id = Some("telegram-1".to_string());
        assert!(validate(&config).is_err());

        config.owner.channel = Some("telegram".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = Config::default();
        config.breaker.threshold = 0;
        assert!(validate(&config).is_err());
    }
}
