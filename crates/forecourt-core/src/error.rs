// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Forecourt notification service.

use thiserror::Error;

use crate::types::Channel;

/// The primary error type used across the Forecourt pipeline.
///
/// Validation variants (`MalformedNumber`, `MissingVariable`) fail fast and
/// are never queued or retried. Provider variants are recovered locally by
/// the dispatcher's retry and fallback budget before they surface.
#[derive(Debug, Error)]
pub enum ForecourtError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// The raw phone number could not be normalized to a canonical identity.
    #[error("malformed phone number `{input}`: {detail}")]
    MalformedNumber { input: String, detail: String },

    /// A template placeholder had no value in the supplied variable map.
    #[error("template `{template}` references `{{{variable}}}` which is missing from variables")]
    MissingVariable { template: String, variable: String },

    /// The consent record rules out every channel for this recipient.
    #[error("consent blocked for {recipient}: {reason}")]
    ConsentBlocked { recipient: String, reason: String },

    /// The provider cannot deliver on this channel (capability mismatch).
    /// Triggers a single fallback to the alternate channel, never a retry
    /// on the same one.
    #[error("channel {channel} unavailable: {detail}")]
    ChannelUnavailable { channel: Channel, detail: String },

    /// A transient provider failure (timeout, 429, 5xx). Retried on the
    /// same channel with backoff; surfaced only once the budget is spent.
    #[error("transient provider failure: {detail}")]
    ProviderTransient { detail: String },

    /// Webhook signature did not match the shared-secret computation.
    #[error("webhook signature invalid")]
    SignatureInvalid,

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Non-transient provider errors (auth failure, invalid request).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ForecourtError::MalformedNumber {
            input: "123".into(),
            detail: "too few digits".into(),
        };
        assert!(err.to_string().contains("123"));
        assert!(err.to_string().contains("too few digits"));

        let err = ForecourtError::MissingVariable {
            template: "mot_reminder".into(),
            variable: "reg".into(),
        };
        assert!(err.to_string().contains("{reg}"));
    }

    #[test]
    fn channel_unavailable_names_channel() {
        let err = ForecourtError::ChannelUnavailable {
            channel: Channel::Whatsapp,
            detail: "sender not registered".into(),
        };
        assert!(err.to_string().contains("whatsapp"));
    }
}
