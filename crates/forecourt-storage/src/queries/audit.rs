// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit log. Insert and read, never update or delete.

use forecourt_core::types::{AuditActor, AuditEntry, MessageStatus, now_iso8601};
use forecourt_core::ForecourtError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::{parse_column, parse_opt_column};

/// Append one audit entry for a message state transition.
pub async fn append(
    db: &Database,
    message_id: &str,
    previous_status: Option<MessageStatus>,
    new_status: MessageStatus,
    actor: AuditActor,
    reason: &str,
) -> Result<i64, ForecourtError> {
    let message_id = message_id.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO audit_log \
                 (message_id, previous_status, new_status, actor, reason, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message_id,
                    previous_status.map(|s| s.to_string()),
                    new_status.to_string(),
                    actor.to_string(),
                    reason,
                    now_iso8601(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Audit trail for one message, in insertion order.
pub async fn list_for_message(
    db: &Database,
    message_id: &str,
) -> Result<Vec<AuditEntry>, ForecourtError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, previous_status, new_status, actor, reason, created_at \
                 FROM audit_log WHERE message_id = ?1 ORDER BY id ASC",
            )?;
            let entries = stmt
                .query_map(params![message_id], |row| {
                    Ok(AuditEntry {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        previous_status: parse_opt_column(2, row.get::<_, Option<String>>(2)?)?,
                        new_status: parse_column(3, row.get::<_, String>(3)?)?,
                        actor: parse_column(4, row.get::<_, String>(4)?)?,
                        reason: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}
