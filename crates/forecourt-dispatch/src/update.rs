// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent application of provider status callbacks.
//!
//! Callbacks arrive out of order and may be redelivered. A callback only
//! moves a message forward in the state machine; anything else is a
//! logged no-op returned as `200` so the provider stops retrying.

use forecourt_core::types::{AuditActor, MessageStatus, ProviderStatus};
use forecourt_core::ForecourtError;
use forecourt_storage::queries::{audit, messages};
use forecourt_storage::Database;
use tracing::{info, warn};

/// What a status callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied(MessageStatus),
    /// Not strictly later than the current status; no state change.
    Duplicate,
    /// SID not tracked by this system; logged and discarded.
    UnknownSid,
    /// Status string outside the known set; logged and discarded.
    UnknownStatus,
}

/// Apply one provider status callback, keyed by provider SID.
///
/// Concurrent callbacks for the same message race on a conditional
/// status write; the loser re-reads and re-evaluates, so exactly one
/// audit entry is written per accepted transition.
pub async fn apply_status_update(
    db: &Database,
    provider_sid: &str,
    raw_status: &str,
    price: Option<f64>,
) -> Result<UpdateOutcome, ForecourtError> {
    let Some(message) = messages::get_by_provider_sid(db, provider_sid).await? else {
        info!(provider_sid, raw_status, "callback for unknown sid, discarding");
        return Ok(UpdateOutcome::UnknownSid);
    };

    let Some(next) = ProviderStatus::parse(raw_status).as_message_status() else {
        warn!(provider_sid, raw_status, "unrecognized provider status, discarding");
        return Ok(UpdateOutcome::UnknownStatus);
    };

    let mut current = message.status;
    loop {
        if !current.accepts(next) {
            info!(
                message_id = %message.id,
                %current,
                %next,
                "duplicate or out-of-order callback, no-op"
            );
            return Ok(UpdateOutcome::Duplicate);
        }
        if messages::transition_status(db, &message.id, current, next).await? {
            break;
        }
        // Lost the race; re-read and re-check against the new status.
        let Some(reloaded) = messages::get_message(db, &message.id).await? else {
            return Ok(UpdateOutcome::UnknownSid);
        };
        current = reloaded.status;
    }

    audit::append(
        db,
        &message.id,
        Some(current),
        next,
        AuditActor::Webhook,
        &format!("provider reported {raw_status}"),
    )
    .await?;
    if let Some(price) = price {
        messages::set_cost(db, &message.id, price).await?;
    }
    info!(message_id = %message.id, status = %next, "status updated from webhook");
    Ok(UpdateOutcome::Applied(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::types::{Channel, Message, MessageType, now_iso8601};
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("update.db").to_str().unwrap())
            .await
            .unwrap();
        let msg = Message {
            id: "m1".to_string(),
            recipient: "+447843275372".to_string(),
            customer_id: None,
            vehicle_reg: None,
            message_type: MessageType::MotReminder,
            body: "body".to_string(),
            preference: None,
            channel: Some(Channel::Whatsapp),
            provider_sid: Some("SM1".to_string()),
            status: MessageStatus::Sent,
            cost: None,
            scheduled_at: None,
            created_at: now_iso8601(),
            updated_at: now_iso8601(),
        };
        messages::insert_message(&db, &msg).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn forward_transition_applies_once() {
        let (db, _dir) = setup().await;

        let outcome = apply_status_update(&db, "SM1", "delivered", Some(0.04))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied(MessageStatus::Delivered));

        let msg = messages::get_message(&db, "m1").await.unwrap().unwrap();
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.cost, Some(0.04));
        assert_eq!(audit::list_for_message(&db, "m1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replayed_callback_is_a_no_op() {
        let (db, _dir) = setup().await;

        apply_status_update(&db, "SM1", "delivered", None).await.unwrap();
        for _ in 0..3 {
            let outcome = apply_status_update(&db, "SM1", "delivered", None)
                .await
                .unwrap();
            assert_eq!(outcome, UpdateOutcome::Duplicate);
        }

        // Exactly one audit entry for N deliveries of the same callback.
        assert_eq!(audit::list_for_message(&db, "m1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn out_of_order_callbacks_keep_highest_status() {
        let (db, _dir) = setup().await;

        apply_status_update(&db, "SM1", "read", None).await.unwrap();
        let outcome = apply_status_update(&db, "SM1", "delivered", None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Duplicate);

        let msg = messages::get_message(&db, "m1").await.unwrap().unwrap();
        assert_eq!(msg.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn stale_success_cannot_resurrect_failure() {
        let (db, _dir) = setup().await;

        apply_status_update(&db, "SM1", "failed", None).await.unwrap();
        let outcome = apply_status_update(&db, "SM1", "delivered", None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Duplicate);

        let msg = messages::get_message(&db, "m1").await.unwrap().unwrap();
        assert_eq!(msg.status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn unknown_sid_and_status_are_discarded() {
        let (db, _dir) = setup().await;

        assert_eq!(
            apply_status_update(&db, "SM-gone", "delivered", None)
                .await
                .unwrap(),
            UpdateOutcome::UnknownSid
        );
        assert_eq!(
            apply_status_update(&db, "SM1", "partially_delivered", None)
                .await
                .unwrap(),
            UpdateOutcome::UnknownStatus
        );

        let msg = messages::get_message(&db, "m1").await.unwrap().unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(audit::list_for_message(&db, "m1").await.unwrap().is_empty());
    }
}
