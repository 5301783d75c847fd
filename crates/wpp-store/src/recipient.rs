// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recipient projection: monotonic status upgrades and first-occurrence
//! timestamps for campaign recipients.

use crate::StoreResult;
use chrono::NaiveDateTime;
use serde_json::Value;
use sqlx::mysql::MySqlConnection;
use wpp_core::{
    MessageEvent, MessageStatus, RecipientStatus, TransitionDecision, decide_transition,
};

/// Operational recipient row, restricted to the columns this projection
/// reads and writes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecipientRow {
    /// Primary key.
    pub id: u64,
    /// Current status string.
    pub status: String,
    /// Provider message id.
    pub gupshup_message_id: Option<String>,
    /// WhatsApp network message id.
    pub whatsapp_message_id: Option<String>,
    /// First provider acceptance.
    pub accepted_at: Option<NaiveDateTime>,
    /// First transport handoff.
    pub sent_at: Option<NaiveDateTime>,
    /// First delivery or read.
    pub reached_at: Option<NaiveDateTime>,
    /// First failure.
    pub failed_at: Option<NaiveDateTime>,
    /// Latest observed event time.
    pub last_event_at: Option<NaiveDateTime>,
    /// Provider error code from the latest failure.
    pub last_error_code: Option<String>,
    /// Provider error description from the latest failure.
    pub last_error_reason: Option<String>,
    /// Raw error object from the latest failure.
    pub error: Option<Value>,
}

impl RecipientRow {
    fn current_status(&self) -> RecipientStatus {
        RecipientStatus::from_db_str(&self.status).unwrap_or(RecipientStatus::Pending)
    }
}

/// Result of applying a message event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// At least one field changed.
    Updated,
    /// Event matched a recipient but changed nothing.
    Noop,
    /// No recipient matched the event's ids (or the event carried none).
    NotFound,
}

/// Final column values for an update; produced only when something
/// actually changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientPatch {
    /// Status string to persist.
    pub status: String,
    /// WhatsApp id after backfill.
    pub whatsapp_message_id: Option<String>,
    /// First-occurrence timestamps after fills.
    pub accepted_at: Option<NaiveDateTime>,
    /// See `accepted_at`.
    pub sent_at: Option<NaiveDateTime>,
    /// See `accepted_at`.
    pub reached_at: Option<NaiveDateTime>,
    /// See `accepted_at`.
    pub failed_at: Option<NaiveDateTime>,
    /// Monotonically advancing event clock.
    pub last_event_at: Option<NaiveDateTime>,
    /// Error metadata after failure updates.
    pub last_error_code: Option<String>,
    /// See `last_error_code`.
    pub last_error_reason: Option<String>,
    /// See `last_error_code`.
    pub error: Option<Value>,
}

/// Compute the projection of `event` onto `row`. Returns `None` when no
/// field would change.
///
/// The status itself moves only on an upgrade (rank increase, or the
/// failed-supersedes rule); first-occurrence timestamps and the WhatsApp
/// id backfill apply even when the status does not move. A failure
/// arriving after `READ` changes nothing at all.
#[must_use]
pub fn project_message_event(
    row: &RecipientRow,
    event: &MessageEvent,
    incoming: MessageStatus,
    now: NaiveDateTime,
) -> Option<RecipientPatch> {
    let current = row.current_status();
    if incoming == MessageStatus::Failed && current == RecipientStatus::Read {
        return None;
    }
    let decision = decide_transition(current, incoming);

    let event_naive = event.event_at.map(|t| t.naive_utc());
    let stamp = event_naive.unwrap_or(now);

    let mut patch = RecipientPatch {
        status: row.status.clone(),
        whatsapp_message_id: row.whatsapp_message_id.clone(),
        accepted_at: row.accepted_at,
        sent_at: row.sent_at,
        reached_at: row.reached_at,
        failed_at: row.failed_at,
        last_event_at: row.last_event_at,
        last_error_code: row.last_error_code.clone(),
        last_error_reason: row.last_error_reason.clone(),
        error: row.error.clone(),
    };

    if decision == TransitionDecision::Upgrade {
        patch.status = incoming.target().as_db_str().to_string();
        if let Some(at) = event_naive {
            if patch.last_event_at.is_none_or(|prev| at > prev) {
                patch.last_event_at = Some(at);
            }
        }
    }

    if patch.whatsapp_message_id.is_none() {
        patch.whatsapp_message_id = event.whatsapp_message_id.clone();
    }

    match incoming {
        MessageStatus::Accepted => {
            patch.accepted_at = patch.accepted_at.or(Some(stamp));
        }
        MessageStatus::Sent => {
            patch.sent_at = patch.sent_at.or(Some(stamp));
        }
        MessageStatus::Delivered | MessageStatus::Read => {
            patch.reached_at = patch.reached_at.or(Some(stamp));
        }
        MessageStatus::Failed => {
            patch.failed_at = patch.failed_at.or(Some(stamp));
            if event.error_code.is_some() {
                patch.last_error_code = event.error_code.clone();
            }
            if event.error_reason.is_some() {
                patch.last_error_reason = event.error_reason.clone();
            }
            if event.error_payload.is_some() {
                patch.error = event.error_payload.clone();
            }
        }
    }

    let unchanged = patch.status == row.status
        && patch.whatsapp_message_id == row.whatsapp_message_id
        && patch.accepted_at == row.accepted_at
        && patch.sent_at == row.sent_at
        && patch.reached_at == row.reached_at
        && patch.failed_at == row.failed_at
        && patch.last_event_at == row.last_event_at
        && patch.last_error_code == row.last_error_code
        && patch.last_error_reason == row.last_error_reason
        && patch.error == row.error;
    if unchanged { None } else { Some(patch) }
}

const RECIPIENT_COLUMNS: &str = "id, status, gupshup_message_id, whatsapp_message_id, \
     accepted_at, sent_at, reached_at, failed_at, last_event_at, \
     last_error_code, last_error_reason, error";

async fn find_recipient(
    conn: &mut MySqlConnection,
    event: &MessageEvent,
) -> StoreResult<Option<RecipientRow>> {
    if let Some(mid) = event.message_id.as_deref() {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM campaign_recipient WHERE gupshup_message_id = ? LIMIT 1"
        ))
        .bind(mid)
        .fetch_optional(&mut *conn)
        .await?;
        if row.is_some() {
            return Ok(row);
        }
    }
    if let Some(wid) = event.whatsapp_message_id.as_deref() {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM campaign_recipient WHERE whatsapp_message_id = ? LIMIT 1"
        ))
        .bind(wid)
        .fetch_optional(&mut *conn)
        .await?;
        return Ok(row);
    }
    Ok(None)
}

/// Apply a message event inside the caller's transaction.
pub async fn apply_message_event(
    conn: &mut MySqlConnection,
    event: &MessageEvent,
    incoming: MessageStatus,
    now: NaiveDateTime,
) -> StoreResult<ApplyOutcome> {
    let Some(row) = find_recipient(conn, event).await? else {
        return Ok(ApplyOutcome::NotFound);
    };
    let Some(patch) = project_message_event(&row, event, incoming, now) else {
        return Ok(ApplyOutcome::Noop);
    };
    sqlx::query(
        "UPDATE campaign_recipient \
         SET status = ?, whatsapp_message_id = ?, accepted_at = ?, sent_at = ?, \
             reached_at = ?, failed_at = ?, last_event_at = ?, last_error_code = ?, \
             last_error_reason = ?, error = ?, updated_at = UTC_TIMESTAMP() \
         WHERE id = ?",
    )
    .bind(&patch.status)
    .bind(&patch.whatsapp_message_id)
    .bind(patch.accepted_at)
    .bind(patch.sent_at)
    .bind(patch.reached_at)
    .bind(patch.failed_at)
    .bind(patch.last_event_at)
    .bind(&patch.last_error_code)
    .bind(&patch.last_error_reason)
    .bind(&patch.error)
    .bind(row.id)
    .execute(conn)
    .await?;
    Ok(ApplyOutcome::Updated)
}
