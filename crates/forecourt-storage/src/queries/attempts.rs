// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery attempt history, one row per channel tried for a message.

use forecourt_core::types::{Channel, DeliveryAttempt, now_iso8601};
use forecourt_core::ForecourtError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

/// Record the final outcome of one channel's dispatch attempt.
pub async fn insert_attempt(
    db: &Database,
    message_id: &str,
    channel: Channel,
    response_code: Option<u16>,
    error_code: Option<String>,
    error_message: Option<String>,
) -> Result<i64, ForecourtError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO delivery_attempts \
                 (message_id, channel, response_code, error_code, error_message, attempted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message_id,
                    channel.to_string(),
                    response_code,
                    error_code,
                    error_message,
                    now_iso8601(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Channels already tried for a message; drives fallback exhaustion.
pub async fn channels_attempted(
    db: &Database,
    message_id: &str,
) -> Result<Vec<Channel>, ForecourtError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT channel FROM delivery_attempts WHERE message_id = ?1 \
                 ORDER BY attempted_at ASC",
            )?;
            let channels = stmt
                .query_map(params![message_id], |row| {
                    parse_column(0, row.get::<_, String>(0)?)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(channels)
        })
        .await
        .map_err(map_tr_err)
}

/// Full attempt history for a message, oldest first.
pub async fn attempts_for_message(
    db: &Database,
    message_id: &str,
) -> Result<Vec<DeliveryAttempt>, ForecourtError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, channel, response_code, error_code, error_message, \
                 attempted_at FROM delivery_attempts WHERE message_id = ?1 \
                 ORDER BY attempted_at ASC",
            )?;
            let attempts = stmt
                .query_map(params![message_id], |row| {
                    Ok(DeliveryAttempt {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        channel: parse_column(2, row.get::<_, String>(2)?)?,
                        response_code: row.get(3)?,
                        error_code: row.get(4)?,
                        error_message: row.get(5)?,
                        attempted_at: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(attempts)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::types::{Message, MessageStatus, MessageType};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("attempts.db").to_str().unwrap())
            .await
            .unwrap();
        let msg = Message {
            id: "m1".into(),
            recipient: "+447843275372".into(),
            customer_id: None,
            vehicle_reg: None,
            message_type: MessageType::JobUpdate,
            body: "ready".into(),
            preference: None,
            channel: None,
            provider_sid: None,
            status: MessageStatus::Queued,
            cost: None,
            scheduled_at: None,
            created_at: now_iso8601(),
            updated_at: now_iso8601(),
        };
        crate::queries::messages::insert_message(&db, &msg).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn attempts_accumulate_per_channel() {
        let (db, _dir) = setup_db().await;

        insert_attempt(
            &db,
            "m1",
            Channel::Whatsapp,
            Some(400),
            Some("63016".into()),
            Some("outside allowed window".into()),
        )
        .await
        .unwrap();
        insert_attempt(&db, "m1", Channel::Sms, Some(201), None, None)
            .await
            .unwrap();

        let channels = channels_attempted(&db, "m1").await.unwrap();
        assert_eq!(channels, vec![Channel::Whatsapp, Channel::Sms]);

        let attempts = attempts_for_message(&db, "m1").await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].error_code.as_deref(), Some("63016"));
        assert_eq!(attempts[1].response_code, Some(201));
        assert!(attempts[1].error_code.is_none());
    }

    #[tokio::test]
    async fn unknown_message_has_no_attempts() {
        let (db, _dir) = setup_db().await;
        assert!(channels_attempted(&db, "nope").await.unwrap().is_empty());
    }
}
