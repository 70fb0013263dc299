// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message row operations, including the conditional status writes the
//! dispatcher and webhook receiver rely on for per-message serialization.
//!
//! All status mutations are single-row compare-and-set updates
//! (`UPDATE ... WHERE id = ? AND status = ?`); callers observe the
//! affected-row count to learn whether they won the transition. No
//! multi-row transactions, no global locks.

use forecourt_core::types::{Channel, Message, MessageStatus, MessageType, now_iso8601};
use forecourt_core::ForecourtError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::{parse_column, parse_opt_column};

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    Ok(Message {
        id: row.get(0)?,
        recipient: row.get(1)?,
        customer_id: row.get(2)?,
        vehicle_reg: row.get(3)?,
        message_type: parse_column(4, row.get::<_, String>(4)?)?,
        body: row.get(5)?,
        preference: parse_opt_column(6, row.get::<_, Option<String>>(6)?)?,
        channel: parse_opt_column(7, row.get::<_, Option<String>>(7)?)?,
        provider_sid: row.get(8)?,
        status: parse_column(9, row.get::<_, String>(9)?)?,
        cost: row.get(10)?,
        scheduled_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

const MESSAGE_COLUMNS: &str = "id, recipient, customer_id, vehicle_reg, message_type, body, \
     preference, channel, provider_sid, status, cost, scheduled_at, created_at, updated_at";

/// Insert a new message row.
pub async fn insert_message(db: &Database, message: &Message) -> Result<(), ForecourtError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, recipient, customer_id, vehicle_reg, message_type, \
                 body, preference, channel, provider_sid, status, cost, scheduled_at, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    m.id,
                    m.recipient,
                    m.customer_id,
                    m.vehicle_reg,
                    m.message_type.to_string(),
                    m.body,
                    m.preference.map(|c| c.to_string()),
                    m.channel.map(|c| c.to_string()),
                    m.provider_sid,
                    m.status.to_string(),
                    m.cost,
                    m.scheduled_at,
                    m.created_at,
                    m.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a message by id.
pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, ForecourtError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_message) {
                Ok(m) => Ok(Some(m)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a message by its provider-assigned identifier.
///
/// Returns `None` for SIDs this system no longer tracks; the webhook
/// receiver logs and discards those callbacks.
pub async fn get_by_provider_sid(
    db: &Database,
    sid: &str,
) -> Result<Option<Message>, ForecourtError> {
    let sid = sid.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE provider_sid = ?1"
            ))?;
            match stmt.query_row(params![sid], row_to_message) {
                Ok(m) => Ok(Some(m)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Compare-and-set status transition. Returns `true` if this caller won
/// the transition, `false` if the row was not in `expected` status.
pub async fn transition_status(
    db: &Database,
    id: &str,
    expected: MessageStatus,
    new: MessageStatus,
) -> Result<bool, ForecourtError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET status = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND status = ?4",
                params![new.to_string(), now_iso8601(), id, expected.to_string()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a successful dispatch: status `sending -> sent`, chosen channel,
/// and the provider SID, in one conditional write.
pub async fn record_dispatched(
    db: &Database,
    id: &str,
    channel: Channel,
    provider_sid: &str,
) -> Result<bool, ForecourtError> {
    let id = id.to_string();
    let provider_sid = provider_sid.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET status = ?1, channel = ?2, provider_sid = ?3, \
                 updated_at = ?4 WHERE id = ?5 AND status = ?6",
                params![
                    MessageStatus::Sent.to_string(),
                    channel.to_string(),
                    provider_sid,
                    now_iso8601(),
                    id,
                    MessageStatus::Sending.to_string(),
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Attach a webhook-reported cost to a message.
pub async fn set_cost(db: &Database, id: &str, cost: f64) -> Result<(), ForecourtError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET cost = ?1, updated_at = ?2 WHERE id = ?3",
                params![cost, now_iso8601(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert a captured verification code keyed by sender number.
///
/// Latest code wins per number via the partial unique index on
/// `message_type = 'verification_code'`. Returns the row's message id.
pub async fn upsert_verification_code(
    db: &Database,
    recipient: &str,
    code: &str,
    provider_sid: Option<&str>,
) -> Result<String, ForecourtError> {
    let recipient = recipient.to_string();
    let code = code.to_string();
    let provider_sid = provider_sid.map(String::from);
    let id = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| {
            let now = now_iso8601();
            conn.execute(
                "INSERT INTO messages (id, recipient, message_type, body, provider_sid, \
                 status, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
                 ON CONFLICT (recipient) WHERE message_type = 'verification_code' \
                 DO UPDATE SET body = excluded.body, provider_sid = excluded.provider_sid, \
                 updated_at = excluded.updated_at",
                params![
                    id,
                    recipient,
                    MessageType::VerificationCode.to_string(),
                    code,
                    provider_sid,
                    MessageStatus::Delivered.to_string(),
                    now,
                ],
            )?;
            // The surviving row id may predate this call when the upsert
            // took the UPDATE path.
            let row_id: String = conn.query_row(
                "SELECT id FROM messages WHERE recipient = ?1 AND message_type = ?2",
                params![recipient, MessageType::VerificationCode.to_string()],
                |row| row.get(0),
            )?;
            Ok(row_id)
        })
        .await
        .map_err(map_tr_err)
}

/// The most recently captured verification code for a sender, if any.
pub async fn latest_verification_code(
    db: &Database,
    recipient: &str,
) -> Result<Option<String>, ForecourtError> {
    let recipient = recipient.to_string();
    db.connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT body FROM messages WHERE recipient = ?1 AND message_type = ?2",
                params![recipient, MessageType::VerificationCode.to_string()],
                |row| row.get(0),
            ) {
                Ok(code) => Ok(Some(code)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Messages stuck in `sending` since before `cutoff` (crash recovery).
pub async fn stale_sending(db: &Database, cutoff: &str) -> Result<Vec<String>, ForecourtError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM messages WHERE status = 'sending' AND updated_at < ?1",
            )?;
            let ids = stmt
                .query_map(params![cutoff], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}
