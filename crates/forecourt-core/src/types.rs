// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Forecourt workspace.
//!
//! The message lifecycle state machine lives here ([`MessageStatus`]) so
//! that storage, dispatch, and webhook handling all agree on which
//! transitions are legal. Status ordering is total for the happy path
//! (`created < queued < sending < sent < delivered < read`) with `failed`
//! and `undelivered` as terminal branches off `sending`/`sent`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The messaging transport used for one delivery attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
    Sms,
}

impl Channel {
    /// The alternate channel used by the fallback policy.
    pub fn other(self) -> Channel {
        match self {
            Channel::Whatsapp => Channel::Sms,
            Channel::Sms => Channel::Whatsapp,
        }
    }
}

/// Business meaning of a notification.
///
/// `VerificationCode` is the inbound degenerate case: a six-digit code
/// captured from an inbound SMS or call transcription, persisted through
/// the same message/audit plumbing as outbound sends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    MotReminder,
    JobUpdate,
    Verification,
    Custom,
    VerificationCode,
}

/// Message lifecycle status.
///
/// `delivered`, `read`, `failed`, and `undelivered` are terminal.
/// `failed`/`undelivered` are only reachable from `sending`/`sent`, and
/// only ever applied via webhook callbacks or the dispatcher itself --
/// never inferred from elsewhere.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Created,
    Queued,
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
    Undelivered,
}

impl MessageStatus {
    /// Position in the happy-path ordering. `failed`/`undelivered` sit at
    /// the same rank as `sent` so that stale success callbacks cannot
    /// resurrect a dead message.
    fn ordinal(self) -> u8 {
        match self {
            MessageStatus::Created => 0,
            MessageStatus::Queued => 1,
            MessageStatus::Sending => 2,
            MessageStatus::Sent => 3,
            MessageStatus::Failed | MessageStatus::Undelivered => 3,
            MessageStatus::Delivered => 4,
            MessageStatus::Read => 5,
        }
    }

    /// Whether no further transitions are expected from this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Read | MessageStatus::Failed | MessageStatus::Undelivered
        )
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Duplicate or out-of-order webhook callbacks land here as illegal
    /// transitions and are treated as idempotent no-ops by the caller.
    pub fn accepts(self, next: MessageStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            MessageStatus::Failed | MessageStatus::Undelivered => {
                matches!(self, MessageStatus::Sending | MessageStatus::Sent)
            }
            _ => next.ordinal() > self.ordinal(),
        }
    }
}

/// Delivery status as reported by the provider in webhook callbacks.
///
/// Parsed from the raw status string into a closed set, with `Unknown`
/// preserving the raw value so forward-incompatible statuses are logged
/// rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Queued,
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
    Undelivered,
    Unknown(String),
}

impl ProviderStatus {
    /// Parse a provider status string. Never fails; unrecognized values
    /// become [`ProviderStatus::Unknown`].
    pub fn parse(raw: &str) -> ProviderStatus {
        match raw {
            "queued" | "accepted" => ProviderStatus::Queued,
            "sending" => ProviderStatus::Sending,
            "sent" => ProviderStatus::Sent,
            "delivered" => ProviderStatus::Delivered,
            "read" => ProviderStatus::Read,
            "failed" => ProviderStatus::Failed,
            "undelivered" => ProviderStatus::Undelivered,
            other => ProviderStatus::Unknown(other.to_string()),
        }
    }

    /// Map to the internal lifecycle status, or `None` for unknown values.
    pub fn as_message_status(&self) -> Option<MessageStatus> {
        match self {
            ProviderStatus::Queued => Some(MessageStatus::Queued),
            ProviderStatus::Sending => Some(MessageStatus::Sending),
            ProviderStatus::Sent => Some(MessageStatus::Sent),
            ProviderStatus::Delivered => Some(MessageStatus::Delivered),
            ProviderStatus::Read => Some(MessageStatus::Read),
            ProviderStatus::Failed => Some(MessageStatus::Failed),
            ProviderStatus::Undelivered => Some(MessageStatus::Undelivered),
            ProviderStatus::Unknown(_) => None,
        }
    }
}

/// One logical notification, created by the consent gate and mutated only
/// by the dispatcher and the webhook receiver. Never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Canonical recipient identity (normalized E.164 form).
    pub recipient: String,
    /// Associated customer record, if known.
    pub customer_id: Option<String>,
    /// Associated vehicle registration, if known.
    pub vehicle_reg: Option<String>,
    pub message_type: MessageType,
    /// Rendered body text. Byte-identical regardless of eventual channel.
    pub body: String,
    /// Caller's channel preference, if any.
    pub preference: Option<Channel>,
    /// Channel chosen by the selector for the successful (or final) attempt.
    pub channel: Option<Channel>,
    /// Provider message identifier, assigned on successful dispatch.
    pub provider_sid: Option<String>,
    pub status: MessageStatus,
    /// Cost in a currency-agnostic decimal unit, reported via webhook.
    pub cost: Option<f64>,
    /// Deferred-send timestamp (ISO 8601), if the caller scheduled it.
    pub scheduled_at: Option<String>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

/// Per-recipient consent state, scoped per channel.
///
/// The consent gate is the single enforcement point for this record; no
/// other component may dispatch around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Canonical recipient identity this record applies to.
    pub recipient: String,
    /// Explicit opt-in on file. `None` means never recorded either way.
    pub opted_in: Option<bool>,
    /// Channel-scoped opt-outs.
    pub whatsapp_opt_out: bool,
    pub sms_opt_out: bool,
    /// ISO 8601 timestamp of the last consent change.
    pub changed_at: String,
}

impl ConsentRecord {
    /// Whether this record permits sending on the given channel.
    pub fn permits(&self, channel: Channel) -> bool {
        match channel {
            Channel::Whatsapp => !self.whatsapp_opt_out,
            Channel::Sms => !self.sms_opt_out,
        }
    }

    /// Whether every channel is opted out.
    pub fn blocks_all_channels(&self) -> bool {
        self.whatsapp_opt_out && self.sms_opt_out
    }
}

/// Why a message is being held in the verification queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HoldReason {
    AwaitingConsentCheck,
    AwaitingTemplateApproval,
    Scheduled,
}

/// A message held in the verification queue pending eligibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Auto-assigned row id.
    pub id: i64,
    pub message_id: String,
    pub reason: HoldReason,
    /// ISO 8601 timestamp after which eligibility is re-checked.
    pub recheck_at: String,
    pub created_at: String,
}

/// Who applied a message state transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    System,
    Webhook,
    Operator,
}

/// Immutable audit record, appended on every message state transition.
///
/// `previous_status` is `None` for the entry written at message creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub message_id: String,
    pub previous_status: Option<MessageStatus>,
    pub new_status: MessageStatus,
    pub actor: AuditActor,
    pub reason: String,
    pub created_at: String,
}

/// One concrete provider call for a message.
///
/// A message has at most one attempt row per channel: same-channel
/// transient retries fold into a single row recording the final outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: i64,
    pub message_id: String,
    pub channel: Channel,
    /// HTTP status returned by the provider, if a response was received.
    pub response_code: Option<u16>,
    /// Provider error code, if the attempt failed.
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub attempted_at: String,
}

/// A single outbound request handed to the messaging provider.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Canonical recipient identity.
    pub to: String,
    pub channel: Channel,
    /// Final rendered body text.
    pub body: String,
}

/// Successful provider acceptance of a dispatch request.
#[derive(Debug, Clone)]
pub struct ProviderReceipt {
    /// Provider-assigned message identifier.
    pub sid: String,
    /// Raw status string the provider reported on acceptance.
    pub raw_status: String,
    /// HTTP status the provider answered with.
    pub response_code: u16,
}

/// Classified provider failure, driving the retry-vs-fallback decision.
///
/// The distinction matters: conflating `ChannelUnavailable` with
/// `Transient` would duplicate sends across both channels on ordinary
/// network blips.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderFailure {
    /// Capability/acceptance failure. Fall back to the alternate channel.
    #[error("channel unavailable (code {code:?}): {message}")]
    ChannelUnavailable { code: Option<u32>, message: String },

    /// Timeout, 429, or 5xx. Retry the same channel with backoff.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// Permanent failure (bad request, auth). No retry on any channel.
    #[error("permanent failure (code {code:?}): {message}")]
    Fatal { code: Option<u32>, message: String },
}

/// ISO 8601 timestamp for the current instant, millisecond precision.
pub fn now_iso8601() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
