// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Forecourt notification service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Forecourt configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to values
/// that work for local development.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForecourtConfig {
    /// Service identity and runtime behavior.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Phone number normalization settings.
    #[serde(default)]
    pub contact: ContactConfig,

    /// Messaging provider credentials and sender numbers.
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Dispatch retry, fallback, and queue-sweep settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Deployment environment. Webhook signature validation is enforced only
/// in production; elsewhere a mismatch is accepted with a warning to ease
/// local testing against replayed callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
}

/// Service identity and runtime behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deployment environment.
    #[serde(default = "default_environment")]
    pub environment: Environment,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            environment: default_environment(),
        }
    }
}

fn default_service_name() -> String {
    "forecourt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> Environment {
    Environment::Development
}

/// Phone number normalization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContactConfig {
    /// Country code digits (no `+`) substituted for a national trunk `0`.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
        }
    }
}

fn default_country_code() -> String {
    "44".to_string()
}

/// Messaging provider credentials and sender numbers.
///
/// A channel is considered configured only when its sender number is set;
/// the channel selector skips unconfigured channels.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TwilioConfig {
    /// Account SID. `None` disables dispatch entirely.
    #[serde(default)]
    pub account_sid: Option<String>,

    /// Auth token. Also the shared secret for webhook signatures.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// WhatsApp sender number (E.164, without the `whatsapp:` prefix).
    #[serde(default)]
    pub whatsapp_from: Option<String>,

    /// SMS sender number (E.164).
    #[serde(default)]
    pub sms_from: Option<String>,

    /// API base URL. Overridden in tests to point at a mock server.
    #[serde(default = "default_twilio_base_url")]
    pub base_url: String,

    /// Per-request timeout for provider calls, in seconds.
    #[serde(default = "default_twilio_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            whatsapp_from: None,
            sms_from: None,
            base_url: default_twilio_base_url(),
            timeout_secs: default_twilio_timeout_secs(),
        }
    }
}

fn default_twilio_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_twilio_timeout_secs() -> u64 {
    15
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("forecourt").join("forecourt.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "forecourt.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for the operator API (`None` = auth disabled, only
    /// sensible in development).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Externally visible base URL used to reconstruct the canonical
    /// webhook URL for signature validation. Required in production.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            public_url: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8350
}

/// Dispatch retry, fallback, and verification-queue settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Same-channel retries after a transient provider failure.
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff multiplier applied per retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Interval between verification-queue sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Hours a held message may wait before expiring to `failed`.
    #[serde(default = "default_queue_retention_hours")]
    pub queue_retention_hours: u64,

    /// Message types whose provider templates are approved for sending.
    /// Types absent from this list defer with `awaiting_template_approval`.
    #[serde(default = "default_approved_templates")]
    pub approved_templates: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_transient_retries: default_max_transient_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            sweep_interval_secs: default_sweep_interval_secs(),
            queue_retention_hours: default_queue_retention_hours(),
            approved_templates: default_approved_templates(),
        }
    }
}

fn default_max_transient_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_queue_retention_hours() -> u64 {
    72
}

fn default_approved_templates() -> Vec<String> {
    vec![
        "mot_reminder".to_string(),
        "job_update".to_string(),
        "verification".to_string(),
        "custom".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_development_safe() {
        let config = ForecourtConfig::default();
        assert_eq!(config.service.environment, Environment::Development);
        assert_eq!(config.contact.default_country_code, "44");
        assert!(config.twilio.account_sid.is_none());
        assert_eq!(config.dispatch.max_transient_retries, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml_str = r#"
[service]
name = "test"
log_levle = "debug"
"#;
        assert!(toml::from_str::<ForecourtConfig>(toml_str).is_err());
    }

    #[test]
    fn environment_deserializes_lowercase() {
        let toml_str = r#"
[service]
environment = "production"
"#;
        let config: ForecourtConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.environment, Environment::Production);
    }

    #[test]
    fn twilio_section_parses() {
        let toml_str = r#"
[twilio]
account_sid = "AC123"
auth_token = "secret"
whatsapp_from = "+14155238886"
sms_from = "+14155551234"
"#;
        let config: ForecourtConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.twilio.account_sid.as_deref(), Some("AC123"));
        assert_eq!(config.twilio.base_url, "https://api.twilio.com");
        assert_eq!(config.twilio.timeout_secs, 15);
    }
}
