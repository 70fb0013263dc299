// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./forecourt.toml` > `~/.config/forecourt/forecourt.toml`
//! > `/etc/forecourt/forecourt.toml` with environment variable overrides via
//! the `FORECOURT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ForecourtConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/forecourt/forecourt.toml` (system-wide)
/// 3. `~/.config/forecourt/forecourt.toml` (user XDG config)
/// 4. `./forecourt.toml` (local directory)
/// 5. `FORECOURT_*` environment variables
pub fn load_config() -> Result<ForecourtConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ForecourtConfig::default()))
        .merge(Toml::file("/etc/forecourt/forecourt.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("forecourt/forecourt.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("forecourt.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ForecourtConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ForecourtConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ForecourtConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ForecourtConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `FORECOURT_TWILIO_AUTH_TOKEN` must map
/// to `twilio.auth_token`, not `twilio.auth.token`.
fn env_provider() -> Env {
    Env::prefixed("FORECOURT_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("contact_", "contact.", 1)
            .replacen("twilio_", "twilio.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("dispatch_", "dispatch.", 1);
        mapped.into()
    })
}
