// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification queue operations.
//!
//! The queue holds messages the consent gate deferred rather than
//! dispatched: scheduled sends, templates awaiting approval, and custom
//! messages awaiting a consent check. The sweeper re-evaluates due
//! entries and expires the overdue ones.

use forecourt_core::types::{HoldReason, QueueEntry, now_iso8601};
use forecourt_core::ForecourtError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<QueueEntry, rusqlite::Error> {
    Ok(QueueEntry {
        id: row.get(0)?,
        message_id: row.get(1)?,
        reason: parse_column(2, row.get::<_, String>(2)?)?,
        recheck_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Add a message to the verification queue.
pub async fn enqueue(
    db: &Database,
    message_id: &str,
    reason: HoldReason,
    recheck_at: &str,
) -> Result<i64, ForecourtError> {
    let message_id = message_id.to_string();
    let recheck_at = recheck_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO verification_queue (message_id, reason, recheck_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id, reason.to_string(), recheck_at, now_iso8601()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Entries whose recheck time has passed, oldest first.
pub async fn due_entries(db: &Database, now: &str) -> Result<Vec<QueueEntry>, ForecourtError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, reason, recheck_at, created_at \
                 FROM verification_queue WHERE recheck_at <= ?1 ORDER BY recheck_at ASC",
            )?;
            let entries = stmt
                .query_map(params![now], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// All held entries regardless of recheck time, oldest first.
pub async fn list_pending(db: &Database, limit: u32) -> Result<Vec<QueueEntry>, ForecourtError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, reason, recheck_at, created_at \
                 FROM verification_queue ORDER BY created_at ASC LIMIT ?1",
            )?;
            let entries = stmt
                .query_map(params![limit], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Push an entry's recheck time forward after a still-not-eligible sweep.
pub async fn bump_recheck(db: &Database, id: i64, recheck_at: &str) -> Result<(), ForecourtError> {
    let recheck_at = recheck_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE verification_queue SET recheck_at = ?1 WHERE id = ?2",
                params![recheck_at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove an entry once its message has been released or expired.
pub async fn remove(db: &Database, id: i64) -> Result<(), ForecourtError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM verification_queue WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
