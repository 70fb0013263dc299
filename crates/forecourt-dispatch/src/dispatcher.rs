// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery dispatcher: the gate-to-provider pipeline for one message.
//!
//! `submit` owns everything up to the message row existing (normalize,
//! render, gate, queue or audit). `dispatch` owns the provider round
//! trip: claim the row with a conditional `queued -> sending` write,
//! walk channels via the selector, retry transient failures on the same
//! channel with backoff, and fall back across channels at most once.
//!
//! The `sending` claim is an internal latch, not an audited business
//! transition; the audit trail records `queued -> sent` (or `failed`)
//! once the outcome is known.

use std::collections::HashMap;
use std::sync::Arc;

use forecourt_config::ForecourtConfig;
use forecourt_core::types::{
    AuditActor, Channel, DispatchRequest, HoldReason, Message, MessageStatus, MessageType,
    ProviderFailure, ProviderReceipt, now_iso8601,
};
use forecourt_core::{ContactNormalizer, ForecourtError, MessagingProvider};
use forecourt_storage::queries::{attempts, audit, consent, messages, queue};
use forecourt_storage::Database;
use tracing::{info, warn};

use crate::backoff::BackoffPolicy;
use crate::gate::{ConsentGate, GateDecision};
use crate::selector::{select_channel, Selection};
use crate::template::TemplateRenderer;

/// One caller-facing send request, pre-normalization.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub recipient: String,
    pub message_type: MessageType,
    pub variables: HashMap<String, String>,
    pub channel_preference: Option<Channel>,
    pub customer_id: Option<String>,
    pub vehicle_reg: Option<String>,
    /// ISO 8601; a future value defers the send.
    pub scheduled_at: Option<String>,
}

/// Accepted outcome of `submit`. Blocks and validation failures surface
/// as errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Message created in `queued`; dispatch may proceed.
    Queued { message_id: String },
    /// Message created in `created` and parked in the verification queue.
    Held {
        message_id: String,
        reason: HoldReason,
    },
}

/// Final outcome of one channel's attempt, after the transient retry
/// budget is spent.
enum ChannelOutcome {
    Accepted(ProviderReceipt),
    /// Channel cannot deliver (capability failure or spent retry budget).
    /// The selector may offer the alternate channel next.
    ChannelFailed {
        error_code: Option<String>,
        error_message: String,
    },
    /// Permanent failure; no channel will do better.
    Fatal {
        error_code: Option<String>,
        error_message: String,
    },
}

pub struct Dispatcher {
    db: Database,
    provider: Arc<dyn MessagingProvider>,
    normalizer: ContactNormalizer,
    renderer: TemplateRenderer,
    gate: ConsentGate,
    backoff: BackoffPolicy,
    sweep_interval_secs: u64,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        provider: Arc<dyn MessagingProvider>,
        config: &ForecourtConfig,
    ) -> Self {
        Self {
            db,
            provider,
            normalizer: ContactNormalizer::new(config.contact.default_country_code.clone()),
            renderer: TemplateRenderer::new(),
            gate: ConsentGate::new(config.dispatch.approved_templates.clone()),
            backoff: BackoffPolicy::from_config(&config.dispatch),
            sweep_interval_secs: config.dispatch.sweep_interval_secs,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Gate a send request and create the message row (or refuse).
    ///
    /// Returns once the message reaches `queued` or the verification
    /// queue; the caller decides when to invoke [`dispatch`](Self::dispatch).
    pub async fn submit(&self, request: SendRequest) -> Result<SendOutcome, ForecourtError> {
        let recipient = self.normalizer.normalize(&request.recipient)?;
        let body = self
            .renderer
            .render(request.message_type, &request.variables)?;

        let consent_record = consent::get_consent(&self.db, &recipient).await?;
        let now = now_iso8601();
        let decision = self.gate.evaluate(
            consent_record.as_ref(),
            request.message_type,
            request.scheduled_at.as_deref(),
            &now,
        );

        let message_id = uuid::Uuid::new_v4().to_string();
        match decision {
            GateDecision::Block(reason) => {
                warn!(recipient = %recipient, %reason, "send blocked by consent gate");
                audit::append(
                    &self.db,
                    &message_id,
                    None,
                    MessageStatus::Failed,
                    AuditActor::System,
                    &format!("consent_blocked: {reason}"),
                )
                .await?;
                Err(ForecourtError::ConsentBlocked { recipient, reason })
            }
            GateDecision::Defer(reason) => {
                let message = self.build_message(
                    &message_id,
                    &recipient,
                    &request,
                    body,
                    MessageStatus::Created,
                );
                messages::insert_message(&self.db, &message).await?;
                audit::append(
                    &self.db,
                    &message_id,
                    None,
                    MessageStatus::Created,
                    AuditActor::System,
                    &format!("held: {reason}"),
                )
                .await?;
                let recheck_at = match reason {
                    HoldReason::Scheduled => request
                        .scheduled_at
                        .clone()
                        .unwrap_or_else(now_iso8601),
                    _ => self.next_recheck(),
                };
                queue::enqueue(&self.db, &message_id, reason, &recheck_at).await?;
                info!(message_id = %message_id, %reason, "message held in verification queue");
                Ok(SendOutcome::Held { message_id, reason })
            }
            GateDecision::Allow => {
                let message = self.build_message(
                    &message_id,
                    &recipient,
                    &request,
                    body,
                    MessageStatus::Queued,
                );
                messages::insert_message(&self.db, &message).await?;
                audit::append(
                    &self.db,
                    &message_id,
                    None,
                    MessageStatus::Queued,
                    AuditActor::System,
                    "accepted",
                )
                .await?;
                Ok(SendOutcome::Queued { message_id })
            }
        }
    }

    fn build_message(
        &self,
        id: &str,
        recipient: &str,
        request: &SendRequest,
        body: String,
        status: MessageStatus,
    ) -> Message {
        let now = now_iso8601();
        Message {
            id: id.to_string(),
            recipient: recipient.to_string(),
            customer_id: request.customer_id.clone(),
            vehicle_reg: request.vehicle_reg.clone(),
            message_type: request.message_type,
            body,
            preference: request.channel_preference,
            channel: None,
            provider_sid: None,
            status,
            cost: None,
            scheduled_at: request.scheduled_at.clone(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn next_recheck(&self) -> String {
        let at = chrono::Utc::now() + chrono::Duration::seconds(self.sweep_interval_secs as i64);
        at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// Drive a `queued` message through the provider.
    ///
    /// Safe to call redundantly: the `queued -> sending` conditional write
    /// admits exactly one worker per message; everyone else returns
    /// without side effects.
    pub async fn dispatch(&self, message_id: &str) -> Result<(), ForecourtError> {
        let Some(message) = messages::get_message(&self.db, message_id).await? else {
            warn!(message_id, "dispatch requested for unknown message");
            return Ok(());
        };

        if !messages::transition_status(
            &self.db,
            message_id,
            MessageStatus::Queued,
            MessageStatus::Sending,
        )
        .await?
        {
            // Another worker holds (or held) the claim.
            return Ok(());
        }

        let consent_record = consent::get_consent(&self.db, &message.recipient).await?;

        loop {
            let prior = attempts::channels_attempted(&self.db, message_id).await?;
            let channel = match select_channel(
                message.preference,
                consent_record.as_ref(),
                self.provider.as_ref(),
                &prior,
            ) {
                Selection::Channel(c) => c,
                Selection::Exhausted => {
                    return self
                        .fail_message(message_id, "all channel options exhausted")
                        .await;
                }
            };

            let request = DispatchRequest {
                to: message.recipient.clone(),
                channel,
                body: message.body.clone(),
            };

            match self.attempt_channel(&request).await {
                ChannelOutcome::Accepted(receipt) => {
                    attempts::insert_attempt(
                        &self.db,
                        message_id,
                        channel,
                        Some(receipt.response_code),
                        None,
                        None,
                    )
                    .await?;
                    if messages::record_dispatched(&self.db, message_id, channel, &receipt.sid)
                        .await?
                    {
                        audit::append(
                            &self.db,
                            message_id,
                            Some(MessageStatus::Queued),
                            MessageStatus::Sent,
                            AuditActor::System,
                            &format!("provider accepted on {channel} (sid {})", receipt.sid),
                        )
                        .await?;
                        info!(message_id, %channel, sid = %receipt.sid, "message sent");
                    } else {
                        // The row left `sending` while the provider call was
                        // in flight; whoever moved it owns the audit trail.
                        warn!(message_id, %channel, sid = %receipt.sid, "send claim lost before completion");
                    }
                    return Ok(());
                }
                ChannelOutcome::ChannelFailed {
                    error_code,
                    error_message,
                } => {
                    warn!(message_id, %channel, error = %error_message, "channel failed, selecting alternate");
                    attempts::insert_attempt(
                        &self.db,
                        message_id,
                        channel,
                        None,
                        error_code,
                        Some(error_message),
                    )
                    .await?;
                    // Loop re-selects; this channel is now in prior_attempts.
                }
                ChannelOutcome::Fatal {
                    error_code,
                    error_message,
                } => {
                    attempts::insert_attempt(
                        &self.db,
                        message_id,
                        channel,
                        None,
                        error_code,
                        Some(error_message.clone()),
                    )
                    .await?;
                    return self.fail_message(message_id, &error_message).await;
                }
            }
        }
    }

    /// One channel's provider calls: initial attempt plus same-channel
    /// retries for transient failures, with exponential backoff.
    async fn attempt_channel(&self, request: &DispatchRequest) -> ChannelOutcome {
        let mut last_transient = String::new();
        for attempt in 0..=self.backoff.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.backoff.delay_for(attempt - 1)).await;
            }
            match self.provider.dispatch(request).await {
                Ok(receipt) => return ChannelOutcome::Accepted(receipt),
                Err(ProviderFailure::Transient { message }) => {
                    warn!(
                        channel = %request.channel,
                        attempt,
                        error = %message,
                        "transient provider failure, will retry"
                    );
                    last_transient = message;
                }
                Err(ProviderFailure::ChannelUnavailable { code, message }) => {
                    return ChannelOutcome::ChannelFailed {
                        error_code: code.map(|c| c.to_string()),
                        error_message: message,
                    };
                }
                Err(ProviderFailure::Fatal { code, message }) => {
                    return ChannelOutcome::Fatal {
                        error_code: code.map(|c| c.to_string()),
                        error_message: message,
                    };
                }
            }
        }
        ChannelOutcome::ChannelFailed {
            error_code: None,
            error_message: format!("retry budget exhausted: {last_transient}"),
        }
    }

    async fn fail_message(&self, message_id: &str, reason: &str) -> Result<(), ForecourtError> {
        if messages::transition_status(
            &self.db,
            message_id,
            MessageStatus::Sending,
            MessageStatus::Failed,
        )
        .await?
        {
            audit::append(
                &self.db,
                message_id,
                Some(MessageStatus::Queued),
                MessageStatus::Failed,
                AuditActor::System,
                reason,
            )
            .await?;
        }
        warn!(message_id, reason, "message failed");
        Ok(())
    }

    /// Release a held message (verification queue drain): `created ->
    /// queued`, then dispatch.
    pub async fn release(&self, message_id: &str) -> Result<(), ForecourtError> {
        if messages::transition_status(
            &self.db,
            message_id,
            MessageStatus::Created,
            MessageStatus::Queued,
        )
        .await?
        {
            audit::append(
                &self.db,
                message_id,
                Some(MessageStatus::Created),
                MessageStatus::Queued,
                AuditActor::System,
                "released from verification queue",
            )
            .await?;
            self.dispatch(message_id).await?;
        }
        Ok(())
    }

    /// Expire a held message past its retention window.
    pub async fn expire(&self, message_id: &str) -> Result<(), ForecourtError> {
        if messages::transition_status(
            &self.db,
            message_id,
            MessageStatus::Created,
            MessageStatus::Failed,
        )
        .await?
        {
            audit::append(
                &self.db,
                message_id,
                Some(MessageStatus::Created),
                MessageStatus::Failed,
                AuditActor::System,
                "verification_expired",
            )
            .await?;
            warn!(message_id, "held message expired");
        }
        Ok(())
    }

    /// Requeue and redeliver messages stranded in `sending` by a crash.
    /// Called once at startup, before the gateway accepts traffic.
    /// Redelivery is safe: the claim was taken but acceptance was never
    /// confirmed, so the provider round trip runs again from `queued`.
    pub async fn recover_stale_sends(&self, cutoff: &str) -> Result<usize, ForecourtError> {
        let stale = messages::stale_sending(&self.db, cutoff).await?;
        let count = stale.len();
        for id in stale {
            if messages::transition_status(
                &self.db,
                &id,
                MessageStatus::Sending,
                MessageStatus::Queued,
            )
            .await?
            {
                audit::append(
                    &self.db,
                    &id,
                    Some(MessageStatus::Sending),
                    MessageStatus::Queued,
                    AuditActor::System,
                    "requeued after restart",
                )
                .await?;
                self.dispatch(&id).await?;
            }
        }
        if count > 0 {
            info!(count, "requeued stale in-flight messages");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::types::ProviderFailure;
    use forecourt_test_utils::MockProvider;
    use std::sync::Mutex;
    use tempfile::tempdir;

    async fn harness(provider: MockProvider) -> (Dispatcher, Arc<MockProvider>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("dispatch.db").to_str().unwrap())
            .await
            .unwrap();
        let provider = Arc::new(provider);
        let config = ForecourtConfig::default();
        let dispatcher = Dispatcher::new(db, provider.clone(), &config);
        (dispatcher, provider, dir)
    }

    fn mot_request() -> SendRequest {
        SendRequest {
            recipient: "07843275372".to_string(),
            message_type: MessageType::MotReminder,
            variables: [
                ("name", "J Smith"),
                ("reg", "AB12CDE"),
                ("date", "2025-03-15"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            channel_preference: None,
            customer_id: None,
            vehicle_reg: Some("AB12CDE".to_string()),
            scheduled_at: None,
        }
    }

    #[tokio::test]
    async fn happy_path_sends_on_whatsapp_with_two_audit_entries() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        provider.enqueue_success("SM777");

        let outcome = dispatcher.submit(mot_request()).await.unwrap();
        let SendOutcome::Queued { message_id } = outcome else {
            panic!("expected queued outcome");
        };
        dispatcher.dispatch(&message_id).await.unwrap();

        let msg = messages::get_message(dispatcher.database(), &message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.channel, Some(Channel::Whatsapp));
        assert_eq!(msg.provider_sid.as_deref(), Some("SM777"));
        assert_eq!(msg.recipient, "+447843275372");

        let trail = audit::list_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].new_status, MessageStatus::Queued);
        assert_eq!(trail[1].previous_status, Some(MessageStatus::Queued));
        assert_eq!(trail[1].new_status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn whatsapp_opt_out_goes_straight_to_sms() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        consent::upsert_consent(
            dispatcher.database(),
            &forecourt_core::types::ConsentRecord {
                recipient: "+447843275372".to_string(),
                opted_in: Some(true),
                whatsapp_opt_out: true,
                sms_opt_out: false,
                changed_at: now_iso8601(),
            },
        )
        .await
        .unwrap();

        let SendOutcome::Queued { message_id } = dispatcher.submit(mot_request()).await.unwrap()
        else {
            panic!("expected queued");
        };
        dispatcher.dispatch(&message_id).await.unwrap();

        // One single attempt, directly on SMS.
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].channel, Channel::Sms);
        let trail = attempts::attempts_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].channel, Channel::Sms);
    }

    #[tokio::test]
    async fn full_opt_out_is_blocked_without_a_message_row() {
        let (dispatcher, _provider, _dir) = harness(MockProvider::new()).await;
        consent::upsert_consent(
            dispatcher.database(),
            &forecourt_core::types::ConsentRecord {
                recipient: "+447843275372".to_string(),
                opted_in: None,
                whatsapp_opt_out: true,
                sms_opt_out: true,
                changed_at: now_iso8601(),
            },
        )
        .await
        .unwrap();

        let err = dispatcher.submit(mot_request()).await.unwrap_err();
        assert!(matches!(err, ForecourtError::ConsentBlocked { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn channel_unavailable_falls_back_once_to_sms() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        provider.enqueue_failure(ProviderFailure::ChannelUnavailable {
            code: Some(63016),
            message: "outside allowed window".to_string(),
        });
        provider.enqueue_success("SM778");

        let SendOutcome::Queued { message_id } = dispatcher.submit(mot_request()).await.unwrap()
        else {
            panic!("expected queued");
        };
        dispatcher.dispatch(&message_id).await.unwrap();

        let msg = messages::get_message(dispatcher.database(), &message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.channel, Some(Channel::Sms));

        let trail = attempts::attempts_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].channel, Channel::Whatsapp);
        assert_eq!(trail[0].error_code.as_deref(), Some("63016"));
        assert_eq!(trail[1].channel, Channel::Sms);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_same_channel() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        provider.enqueue_failure(ProviderFailure::Transient {
            message: "timeout".to_string(),
        });
        provider.enqueue_failure(ProviderFailure::Transient {
            message: "HTTP 503".to_string(),
        });
        provider.enqueue_success("SM779");

        let SendOutcome::Queued { message_id } = dispatcher.submit(mot_request()).await.unwrap()
        else {
            panic!("expected queued");
        };
        dispatcher.dispatch(&message_id).await.unwrap();

        // Three provider calls, all on WhatsApp, one attempt row.
        let calls = provider.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.channel == Channel::Whatsapp));
        let trail = attempts::attempts_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);

        let msg = messages::get_message(dispatcher.database(), &message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_never_exceed_one_per_channel() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        // Spend the entire transient budget on both channels.
        for _ in 0..8 {
            provider.enqueue_failure(ProviderFailure::Transient {
                message: "timeout".to_string(),
            });
        }

        let SendOutcome::Queued { message_id } = dispatcher.submit(mot_request()).await.unwrap()
        else {
            panic!("expected queued");
        };
        dispatcher.dispatch(&message_id).await.unwrap();

        let trail = attempts::attempts_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 2);
        let msg = messages::get_message(dispatcher.database(), &message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn fatal_failure_stops_without_fallback() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        provider.enqueue_failure(ProviderFailure::Fatal {
            code: Some(20003),
            message: "authentication failed".to_string(),
        });

        let SendOutcome::Queued { message_id } = dispatcher.submit(mot_request()).await.unwrap()
        else {
            panic!("expected queued");
        };
        dispatcher.dispatch(&message_id).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        let msg = messages::get_message(dispatcher.database(), &message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn redundant_dispatch_is_a_no_op() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        provider.enqueue_success("SM780");

        let SendOutcome::Queued { message_id } = dispatcher.submit(mot_request()).await.unwrap()
        else {
            panic!("expected queued");
        };
        dispatcher.dispatch(&message_id).await.unwrap();
        dispatcher.dispatch(&message_id).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        let trail = audit::list_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 2);
    }

    #[tokio::test]
    async fn malformed_number_fails_fast() {
        let (dispatcher, _provider, _dir) = harness(MockProvider::new()).await;
        let mut request = mot_request();
        request.recipient = "12ab34".to_string();
        let err = dispatcher.submit(request).await.unwrap_err();
        assert!(matches!(err, ForecourtError::MalformedNumber { .. }));
    }

    #[tokio::test]
    async fn scheduled_send_is_held() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        let mut request = mot_request();
        request.scheduled_at = Some("9999-01-01T00:00:00.000Z".to_string());

        let outcome = dispatcher.submit(request).await.unwrap();
        let SendOutcome::Held { message_id, reason } = outcome else {
            panic!("expected held outcome");
        };
        assert_eq!(reason, HoldReason::Scheduled);
        assert_eq!(provider.call_count(), 0);

        let msg = messages::get_message(dispatcher.database(), &message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Created);
        let pending = queue::list_pending(dispatcher.database(), 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message_id, message_id);
    }

    #[tokio::test]
    async fn release_drains_a_held_message() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        provider.enqueue_success("SM781");
        let mut request = mot_request();
        request.scheduled_at = Some("9999-01-01T00:00:00.000Z".to_string());
        let SendOutcome::Held { message_id, .. } = dispatcher.submit(request).await.unwrap()
        else {
            panic!("expected held");
        };

        dispatcher.release(&message_id).await.unwrap();

        let msg = messages::get_message(dispatcher.database(), &message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        let trail = audit::list_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        // held -> released -> sent.
        assert_eq!(trail.len(), 3);
    }

    #[tokio::test]
    async fn recover_redelivers_stale_sending_rows() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        provider.enqueue_success("SM782");
        let msg = Message {
            id: "stuck".to_string(),
            recipient: "+447843275372".to_string(),
            customer_id: None,
            vehicle_reg: None,
            message_type: MessageType::JobUpdate,
            body: "update".to_string(),
            preference: None,
            channel: None,
            provider_sid: None,
            status: MessageStatus::Sending,
            cost: None,
            scheduled_at: None,
            created_at: now_iso8601(),
            updated_at: now_iso8601(),
        };
        messages::insert_message(dispatcher.database(), &msg).await.unwrap();

        let count = dispatcher
            .recover_stale_sends("9999-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(count, 1);

        // Recovery does not stop at requeueing: the message goes back
        // through the provider and lands in `sent`.
        assert_eq!(provider.call_count(), 1);
        let msg = messages::get_message(dispatcher.database(), "stuck")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.provider_sid.as_deref(), Some("SM782"));

        let trail = audit::list_for_message(dispatcher.database(), "stuck")
            .await
            .unwrap();
        assert_eq!(trail[0].reason, "requeued after restart");
        assert_eq!(trail[1].new_status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn attempt_row_records_provider_response_code() {
        let (dispatcher, provider, _dir) = harness(MockProvider::new()).await;
        provider.enqueue_outcome(Ok(forecourt_core::types::ProviderReceipt {
            sid: "SM783".to_string(),
            raw_status: "accepted".to_string(),
            response_code: 200,
        }));

        let SendOutcome::Queued { message_id } = dispatcher.submit(mot_request()).await.unwrap()
        else {
            panic!("expected queued");
        };
        dispatcher.dispatch(&message_id).await.unwrap();

        let trail = attempts::attempts_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].response_code, Some(200));
    }

    /// Provider double that yanks the message out of `sending` while the
    /// call is in flight, then reports acceptance anyway.
    struct ClaimStealingProvider {
        db: Database,
        target: Mutex<Option<String>>,
    }

    #[async_trait::async_trait]
    impl MessagingProvider for ClaimStealingProvider {
        fn name(&self) -> &str {
            "claim-stealer"
        }

        fn supports(&self, _channel: Channel) -> bool {
            true
        }

        async fn dispatch(
            &self,
            _request: &DispatchRequest,
        ) -> Result<ProviderReceipt, ProviderFailure> {
            let id = self.target.lock().unwrap().take();
            if let Some(id) = id {
                messages::transition_status(
                    &self.db,
                    &id,
                    MessageStatus::Sending,
                    MessageStatus::Queued,
                )
                .await
                .unwrap();
            }
            Ok(ProviderReceipt {
                sid: "SM784".to_string(),
                raw_status: "queued".to_string(),
                response_code: 201,
            })
        }
    }

    #[tokio::test]
    async fn lost_send_claim_skips_the_sent_audit_entry() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("dispatch.db").to_str().unwrap())
            .await
            .unwrap();
        let provider = Arc::new(ClaimStealingProvider {
            db: db.clone(),
            target: Mutex::new(None),
        });
        let config = ForecourtConfig::default();
        let dispatcher = Dispatcher::new(db, provider.clone(), &config);

        let SendOutcome::Queued { message_id } = dispatcher.submit(mot_request()).await.unwrap()
        else {
            panic!("expected queued");
        };
        *provider.target.lock().unwrap() = Some(message_id.clone());
        dispatcher.dispatch(&message_id).await.unwrap();

        // The conditional write lost the claim, so no `sent` transition
        // happened and none may be audited.
        let msg = messages::get_message(dispatcher.database(), &message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.status, MessageStatus::Queued);
        assert_eq!(msg.provider_sid, None);

        let trail = audit::list_for_message(dispatcher.database(), &message_id)
            .await
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].reason, "accepted");
    }
}
