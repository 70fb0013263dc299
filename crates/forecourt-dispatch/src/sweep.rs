// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic verification-queue sweep.
//!
//! Each pass re-evaluates the gate for every due entry: eligible
//! messages are released into dispatch, still-held ones get their
//! recheck pushed forward, entries past the retention window expire to
//! `failed`, and consent reversals fail the message outright.

use std::sync::Arc;
use std::time::Duration;

use forecourt_config::ForecourtConfig;
use forecourt_core::types::{AuditActor, MessageStatus, now_iso8601};
use forecourt_core::ForecourtError;
use forecourt_storage::queries::{audit, consent, messages, queue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::gate::{ConsentGate, GateDecision};

pub struct QueueSweeper {
    dispatcher: Arc<Dispatcher>,
    gate: ConsentGate,
    interval: Duration,
    retention: chrono::Duration,
}

impl QueueSweeper {
    pub fn new(dispatcher: Arc<Dispatcher>, config: &ForecourtConfig) -> Self {
        Self {
            dispatcher,
            gate: ConsentGate::new(config.dispatch.approved_templates.clone()),
            interval: Duration::from_secs(config.dispatch.sweep_interval_secs),
            retention: chrono::Duration::hours(config.dispatch.queue_retention_hours as i64),
        }
    }

    /// Sweep until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "queue sweep failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("queue sweeper stopping");
                    return;
                }
            }
        }
    }

    /// One sweep pass over due entries. Public for tests and for an
    /// event-triggered drain.
    pub async fn sweep_once(&self) -> Result<(), ForecourtError> {
        let db = self.dispatcher.database();
        let now = now_iso8601();
        let expiry_cutoff = (chrono::Utc::now() - self.retention)
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();

        let due = queue::due_entries(db, &now).await?;
        if due.is_empty() {
            return Ok(());
        }
        debug!(count = due.len(), "sweeping due queue entries");

        for entry in due {
            let Some(message) = messages::get_message(db, &entry.message_id).await? else {
                warn!(message_id = %entry.message_id, "queue entry without message, dropping");
                queue::remove(db, entry.id).await?;
                continue;
            };

            // Only `created` messages are still held; anything else was
            // already released or resolved through another path.
            if message.status != MessageStatus::Created {
                queue::remove(db, entry.id).await?;
                continue;
            }

            if entry.created_at < expiry_cutoff {
                self.dispatcher.expire(&entry.message_id).await?;
                queue::remove(db, entry.id).await?;
                continue;
            }

            let consent_record = consent::get_consent(db, &message.recipient).await?;
            let decision = self.gate.evaluate(
                consent_record.as_ref(),
                message.message_type,
                message.scheduled_at.as_deref(),
                &now,
            );
            match decision {
                GateDecision::Allow => {
                    queue::remove(db, entry.id).await?;
                    self.dispatcher.release(&entry.message_id).await?;
                }
                GateDecision::Defer(_) => {
                    let next = (chrono::Utc::now()
                        + chrono::Duration::from_std(self.interval).unwrap_or_default())
                    .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                    .to_string();
                    queue::bump_recheck(db, entry.id, &next).await?;
                }
                GateDecision::Block(reason) => {
                    // Consent changed while held; the message fails rather
                    // than lingering forever.
                    if messages::transition_status(
                        db,
                        &entry.message_id,
                        MessageStatus::Created,
                        MessageStatus::Failed,
                    )
                    .await?
                    {
                        audit::append(
                            db,
                            &entry.message_id,
                            Some(MessageStatus::Created),
                            MessageStatus::Failed,
                            AuditActor::System,
                            &format!("consent_blocked: {reason}"),
                        )
                        .await?;
                    }
                    queue::remove(db, entry.id).await?;
                }
            }
        }
        Ok(())
    }
}
