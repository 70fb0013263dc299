// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twilio Messages API client.
//!
//! Failure classification is the interesting part: timeouts, 429s, and
//! 5xx responses are transient (same-channel retry), a small set of
//! Twilio error codes mean the channel itself cannot deliver (fall back
//! to the other channel), and everything else is permanent.

use std::time::Duration;

use async_trait::async_trait;
use forecourt_config::TwilioConfig;
use forecourt_core::types::{Channel, DispatchRequest, ProviderFailure, ProviderReceipt};
use forecourt_core::MessagingProvider;
use serde::Deserialize;
use tracing::{debug, warn};

/// Twilio error codes that mean the channel cannot deliver to this
/// recipient at all: unregistered WhatsApp number, sandbox restrictions,
/// closed 24-hour session window, unapproved sender.
const CHANNEL_UNAVAILABLE_CODES: [u32; 4] = [63003, 63007, 63016, 63051];

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    code: Option<u32>,
    message: Option<String>,
}

/// HTTP client for the Twilio Messages API.
pub struct TwilioProvider {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    whatsapp_from: Option<String>,
    sms_from: Option<String>,
    base_url: String,
}

impl TwilioProvider {
    /// Build a provider from config. Returns `None` when no account SID
    /// is configured, which disables outbound dispatch entirely.
    pub fn from_config(config: &TwilioConfig) -> Option<Self> {
        let account_sid = config.account_sid.clone()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            http,
            account_sid,
            auth_token: config.auth_token.clone().unwrap_or_default(),
            whatsapp_from: config.whatsapp_from.clone(),
            sms_from: config.sms_from.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn from_number(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Whatsapp => self.whatsapp_from.as_deref(),
            Channel::Sms => self.sms_from.as_deref(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

fn address_for(channel: Channel, number: &str) -> String {
    match channel {
        Channel::Whatsapp => format!("whatsapp:{number}"),
        Channel::Sms => number.to_string(),
    }
}

fn classify_error(status: u16, body: &str) -> ProviderFailure {
    if status == 429 || status >= 500 {
        return ProviderFailure::Transient {
            message: format!("provider returned HTTP {status}"),
        };
    }
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or(ErrorResponse {
        code: None,
        message: None,
    });
    let message = parsed
        .message
        .unwrap_or_else(|| format!("provider returned HTTP {status}"));
    match parsed.code {
        Some(code) if CHANNEL_UNAVAILABLE_CODES.contains(&code) => {
            ProviderFailure::ChannelUnavailable {
                code: Some(code),
                message,
            }
        }
        code => ProviderFailure::Fatal { code, message },
    }
}

#[async_trait]
impl MessagingProvider for TwilioProvider {
    fn name(&self) -> &str {
        "twilio"
    }

    fn supports(&self, channel: Channel) -> bool {
        self.from_number(channel).is_some()
    }

    async fn dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<ProviderReceipt, ProviderFailure> {
        let from = self.from_number(request.channel).ok_or_else(|| {
            ProviderFailure::ChannelUnavailable {
                code: None,
                message: format!("no sender number configured for {}", request.channel),
            }
        })?;

        let form = [
            ("To", address_for(request.channel, &request.to)),
            ("From", address_for(request.channel, from)),
            ("Body", request.body.clone()),
        ];

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderFailure::Transient {
                        message: "provider request timed out".to_string(),
                    }
                } else {
                    ProviderFailure::Transient {
                        message: format!("provider request failed: {e}"),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ProviderFailure::Transient {
            message: format!("failed to read provider response: {e}"),
        })?;

        if (200..300).contains(&status) {
            let accepted: MessageResponse =
                serde_json::from_str(&body).map_err(|e| ProviderFailure::Fatal {
                    code: None,
                    message: format!("unparseable provider response: {e}"),
                })?;
            debug!(
                sid = %accepted.sid,
                status = %accepted.status,
                channel = %request.channel,
                "provider accepted message"
            );
            Ok(ProviderReceipt {
                sid: accepted.sid,
                raw_status: accepted.status,
                response_code: status,
            })
        } else {
            let failure = classify_error(status, &body);
            warn!(
                http_status = status,
                channel = %request.channel,
                error = %failure,
                "provider rejected message"
            );
            Err(failure)
        }
    }
}
