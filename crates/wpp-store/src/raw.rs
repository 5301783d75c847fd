// SPDX-License-Identifier: MIT OR Apache-2.0
//! The append-only raw event buffer.
//!
//! Ingest inserts rows with a UNIQUE dedupe key; the worker claims
//! pending rows with `FOR UPDATE SKIP LOCKED` so replicas never overlap,
//! then marks each row terminal or reschedules it with retry accounting.

use crate::{StoreError, StoreResult};
use chrono::NaiveDateTime;
use serde_json::{Value, json};
use sqlx::mysql::{MySqlConnection, MySqlPool};
use wpp_core::{EventKind, RawHints, truncate_error};

/// A persisted raw event row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawEventRow {
    /// Monotonically assigned identifier.
    pub id: u64,
    /// Producer account id from the URL path.
    pub app_id: String,
    /// Classified kind at ingest time (a hint; the payload is authoritative).
    pub event_kind: String,
    /// Provider event id hint.
    pub provider_event_id: Option<String>,
    /// Provider message id hint.
    pub message_id: Option<String>,
    /// WhatsApp network message id hint.
    pub whatsapp_message_id: Option<String>,
    /// Template name hint.
    pub template_name: Option<String>,
    /// Provider template id hint.
    pub template_provider_id: Option<String>,
    /// Status token hint.
    pub event_status: Option<String>,
    /// Server wall-clock at insert (UTC).
    pub received_at: NaiveDateTime,
    /// Original payload, or wrapped raw text.
    pub payload_json: Option<Value>,
    /// 0 = pending, 1 = terminal.
    pub processed: i8,
    /// Retry counter.
    pub attempts: i32,
    /// Last failure reason (bounded).
    pub last_error: Option<String>,
    /// Wall-clock of the terminal transition.
    pub processed_at: Option<NaiveDateTime>,
    /// Deterministic dedupe key.
    pub dedupe_key: String,
}

impl RawEventRow {
    /// Kind column parsed back into the enum; unknown strings collapse to
    /// [`EventKind::Unknown`].
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::from_db_str(&self.event_kind).unwrap_or(EventKind::Unknown)
    }
}

/// Input for a raw insert.
#[derive(Debug, Clone)]
pub struct NewRawEvent {
    /// Producer account id.
    pub app_id: String,
    /// Classified kind.
    pub event_kind: EventKind,
    /// Denormalized lookup hints.
    pub hints: RawHints,
    /// Payload as structured JSON or wrapped raw text.
    pub payload_json: Value,
    /// Deterministic dedupe key (64 hex chars).
    pub dedupe_key: String,
}

/// Insert a raw event. A dedupe-key collision is not an error: the row
/// already exists and `false` is returned.
pub async fn insert_raw_event(pool: &MySqlPool, event: &NewRawEvent) -> StoreResult<bool> {
    let result = sqlx::query(
        "INSERT INTO wpp_webhook_event_raw \
         (app_id, event_kind, provider_event_id, message_id, whatsapp_message_id, \
          template_name, template_provider_id, event_status, payload_json, dedupe_key) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.app_id)
    .bind(event.event_kind.as_db_str())
    .bind(&event.hints.provider_event_id)
    .bind(&event.hints.message_id)
    .bind(&event.hints.whatsapp_message_id)
    .bind(&event.hints.template_name)
    .bind(&event.hints.template_provider_id)
    .bind(&event.hints.event_status)
    .bind(&event.payload_json)
    .bind(&event.dedupe_key)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(db))
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            Ok(false)
        }
        Err(err) => Err(StoreError::Db(err)),
    }
}

/// Claim up to `batch_size` pending rows, oldest first, skipping rows
/// locked by competing workers. Must run inside the caller's open
/// transaction; the locks are released at commit/rollback.
pub async fn lock_next_batch(
    conn: &mut MySqlConnection,
    batch_size: u32,
) -> StoreResult<Vec<RawEventRow>> {
    let rows = sqlx::query_as::<_, RawEventRow>(
        "SELECT id, app_id, event_kind, provider_event_id, message_id, whatsapp_message_id, \
                template_name, template_provider_id, event_status, received_at, payload_json, \
                processed, attempts, last_error, processed_at, dedupe_key \
         FROM wpp_webhook_event_raw \
         WHERE processed = 0 \
         ORDER BY received_at ASC \
         LIMIT ? \
         FOR UPDATE SKIP LOCKED",
    )
    .bind(batch_size)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Mark a row terminal. `annotation` records a benign-skip reason when the
/// row was consumed without projecting anything.
pub async fn mark_processed(
    conn: &mut MySqlConnection,
    id: u64,
    annotation: Option<&str>,
) -> StoreResult<()> {
    sqlx::query(
        "UPDATE wpp_webhook_event_raw \
         SET processed = 1, processed_at = UTC_TIMESTAMP(), last_error = ? \
         WHERE id = ?",
    )
    .bind(annotation.map(truncate_error))
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Record a failed attempt. With `finalize` the row turns terminal with
/// the attempt count and error preserved; otherwise it stays pending for
/// the next tick.
pub async fn mark_failed_attempt(
    conn: &mut MySqlConnection,
    id: u64,
    attempts: i32,
    error: &str,
    finalize: bool,
) -> StoreResult<()> {
    let error = truncate_error(error);
    if finalize {
        sqlx::query(
            "UPDATE wpp_webhook_event_raw \
             SET processed = 1, attempts = ?, last_error = ?, processed_at = UTC_TIMESTAMP() \
             WHERE id = ?",
        )
        .bind(attempts)
        .bind(&error)
        .bind(id)
        .execute(conn)
        .await?;
    } else {
        sqlx::query(
            "UPDATE wpp_webhook_event_raw SET attempts = ?, last_error = ? WHERE id = ?",
        )
        .bind(attempts)
        .bind(&error)
        .bind(id)
        .execute(conn)
        .await?;
    }
    Ok(())
}

/// Re-parse a persisted payload column into a JSON value.
///
/// The column usually holds structured JSON already; a string value gets
/// one parse attempt and falls back to the `{_raw: …}` wrapper so the
/// normalizer always sees a tree.
#[must_use]
pub fn parse_payload_json(value: Option<&Value>) -> Option<Value> {
    let value = value?;
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => Some(parsed),
            Err(_) => Some(json!({ "_raw": s })),
        },
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_passes_structured_values_through() {
        let v = json!({"statuses": [{"id": "gs-1"}]});
        assert_eq!(parse_payload_json(Some(&v)), Some(v));
    }

    #[test]
    fn parse_reparses_string_columns() {
        let v = json!(r#"{"a":1}"#);
        assert_eq!(parse_payload_json(Some(&v)), Some(json!({"a": 1})));
    }

    #[test]
    fn parse_wraps_unparseable_strings() {
        let v = json!("not json at all");
        assert_eq!(
            parse_payload_json(Some(&v)),
            Some(json!({"_raw": "not json at all"}))
        );
    }

    #[test]
    fn parse_none_is_none() {
        assert_eq!(parse_payload_json(None), None);
    }

    #[test]
    fn row_kind_tolerates_garbage() {
        let mut row = sample_row();
        row.event_kind = "MESSAGE".into();
        assert_eq!(row.kind(), EventKind::Message);
        row.event_kind = "banana".into();
        assert_eq!(row.kind(), EventKind::Unknown);
    }

    fn sample_row() -> RawEventRow {
        RawEventRow {
            id: 1,
            app_id: "app".into(),
            event_kind: "MESSAGE".into(),
            provider_event_id: None,
            message_id: None,
            whatsapp_message_id: None,
            template_name: None,
            template_provider_id: None,
            event_status: None,
            received_at: chrono::DateTime::from_timestamp(1_739_112_000, 0)
                .unwrap()
                .naive_utc(),
            payload_json: None,
            processed: 0,
            attempts: 0,
            last_error: None,
            processed_at: None,
            dedupe_key: "0".repeat(64),
        }
    }
}
