//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::GatewayConfig;

/// Validates the entire configuration.
pub fn validate_config(config: &GatewayConfig) -> ConfigResult<()> {
    if config.prefix.is_empty() {
        return Err(ConfigError::missing_field("prefix"));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    let level = config.logging.level.to_lowercase();
    // Full filter directives (containing '=' or ',') are passed through.
    if !level.contains(['=', ',']) && !valid_levels.contains(&level.as_str()) {
        return Err(ConfigError::validation(format!(
            "invalid log level: {}. Valid values are: {:?}",
            config.logging.level, valid_levels
        )));
    }

    if config.http.port == 0 {
        return Err(ConfigError::InvalidPort(config.http.port));
    }

    if config.otp.ttl_secs == 0 {
        return Err(ConfigError::validation("otp.ttl_secs must be greater than 0"));
    }

    if config.otp.max_attempts == 0 {
        return Err(ConfigError::validation(
            "otp.max_attempts must be greater than 0",
        ));
    }

    if config.otp.rate_limit.window_secs == 0 || config.otp.rate_limit.max_requests == 0 {
        return Err(ConfigError::validation(
            "otp.rate_limit window and request count must be greater than 0",
        ));
    }

    if config.otp.dial_plan.national_length == 0 {
        return Err(ConfigError::validation(
            "otp.dial_plan.national_length must be greater than 0",
        ));
    }

    if !config
        .otp
        .dial_plan
        .default_country
        .chars()
        .all(|c| c.is_ascii_digit())
        || config.otp.dial_plan.default_country.is_empty()
    {
        return Err(ConfigError::validation(
            "otp.dial_plan.default_country must be digits",
        ));
    }

    if !config
        .otp
        .dial_plan
        .trunk_prefix
        .chars()
        .all(|c| c.is_ascii_digit())
    {
        return Err(ConfigError::validation(
            "otp.dial_plan.trunk_prefix must be digits or empty",
        ));
    }

    for number in config.owner_numbers.iter().chain(&config.sudo_numbers) {
        if !number.chars().all(|c| c.is_ascii_digit()) || number.is_empty() {
            return Err(ConfigError::validation(format!(
                "operator number '{number}' must be bare digits"
            )));
        }
    }

    Ok(())
}
