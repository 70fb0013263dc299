// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as production-required secrets and sane retry bounds.

use crate::diagnostic::ConfigError;
use crate::model::{Environment, ForecourtConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &ForecourtConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let cc = config.contact.default_country_code.trim();
    if cc.is_empty() || !cc.chars().all(|c| c.is_ascii_digit()) || cc.starts_with('0') {
        errors.push(ConfigError::Validation {
            message: format!(
                "contact.default_country_code `{cc}` must be country-code digits without a leading 0"
            ),
        });
    }

    let host = config.gateway.host.trim();
    let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
    let is_valid_hostname = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
    if !is_valid_ip && !is_valid_hostname {
        errors.push(ConfigError::Validation {
            message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
        });
    }

    if config.dispatch.backoff_multiplier < 1.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.backoff_multiplier must be >= 1.0, got {}",
                config.dispatch.backoff_multiplier
            ),
        });
    }

    if config.twilio.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "twilio.timeout_secs must be at least 1".to_string(),
        });
    }

    // Production deployments must be able to verify webhook signatures
    // and serve a stable callback URL.
    if config.service.environment == Environment::Production {
        if config.twilio.auth_token.is_none() {
            errors.push(ConfigError::Validation {
                message: "twilio.auth_token is required in production (webhook signatures)"
                    .to_string(),
            });
        }
        if config.gateway.public_url.is_none() {
            errors.push(ConfigError::Validation {
                message: "gateway.public_url is required in production (signature canonical URL)"
                    .to_string(),
            });
        }
        if config.gateway.bearer_token.is_none() {
            errors.push(ConfigError::Validation {
                message: "gateway.bearer_token is required in production".to_string(),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
