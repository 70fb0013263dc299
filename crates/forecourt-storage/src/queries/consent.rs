// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-recipient consent records, keyed by canonical number.

use forecourt_core::types::{ConsentRecord, now_iso8601};
use forecourt_core::ForecourtError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Look up the consent record for a canonical recipient number.
pub async fn get_consent(
    db: &Database,
    recipient: &str,
) -> Result<Option<ConsentRecord>, ForecourtError> {
    let recipient = recipient.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT recipient, opted_in, whatsapp_opt_out, sms_opt_out, changed_at \
                 FROM consent_records WHERE recipient = ?1",
            )?;
            match stmt.query_row(params![recipient], |row| {
                Ok(ConsentRecord {
                    recipient: row.get(0)?,
                    opted_in: row.get::<_, Option<i64>>(1)?.map(|v| v != 0),
                    whatsapp_opt_out: row.get::<_, i64>(2)? != 0,
                    sms_opt_out: row.get::<_, i64>(3)? != 0,
                    changed_at: row.get(4)?,
                })
            }) {
                Ok(r) => Ok(Some(r)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Replace (or create) the consent record for a recipient.
pub async fn upsert_consent(db: &Database, record: &ConsentRecord) -> Result<(), ForecourtError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO consent_records \
                 (recipient, opted_in, whatsapp_opt_out, sms_opt_out, changed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT (recipient) DO UPDATE SET \
                 opted_in = excluded.opted_in, \
                 whatsapp_opt_out = excluded.whatsapp_opt_out, \
                 sms_opt_out = excluded.sms_opt_out, \
                 changed_at = excluded.changed_at",
                params![
                    r.recipient,
                    r.opted_in.map(i64::from),
                    r.whatsapp_opt_out as i64,
                    r.sms_opt_out as i64,
                    r.changed_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Set a single channel opt-out flag, creating the record if absent.
pub async fn set_channel_opt_out(
    db: &Database,
    recipient: &str,
    channel: forecourt_core::types::Channel,
    opted_out: bool,
) -> Result<(), ForecourtError> {
    let mut record = get_consent(db, recipient).await?.unwrap_or(ConsentRecord {
        recipient: recipient.to_string(),
        opted_in: None,
        whatsapp_opt_out: false,
        sms_opt_out: false,
        changed_at: now_iso8601(),
    });
    match channel {
        forecourt_core::types::Channel::Whatsapp => record.whatsapp_opt_out = opted_out,
        forecourt_core::types::Channel::Sms => record.sms_opt_out = opted_out,
    }
    record.changed_at = now_iso8601();
    upsert_consent(db, &record).await
}
