// SPDX-License-Identifier: MIT OR Apache-2.0
//! # wpp-worker
//!
//! The asynchronous projection worker. One serial loop per process: each
//! tick claims a batch of pending raw events under skip-locks, re-derives
//! the typed event from the authoritative payload, projects it, and marks
//! the row terminal or reschedules it with retry accounting. Replicas of
//! this process run the same loop concurrently; the skip-lock claim keeps
//! their batches disjoint.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{NaiveDateTime, Utc};
use sqlx::mysql::{MySqlConnection, MySqlPool};
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use wpp_core::{ConsentAction, MAX_ATTEMPTS, NormalizedEvent};
use wpp_normalizer::normalize;
use wpp_store::raw::{RawEventRow, lock_next_batch, mark_failed_attempt, mark_processed, parse_payload_json};
use wpp_store::recipient::{ApplyOutcome, apply_message_event};
use wpp_store::template::{TemplateApplyOutcome, apply_template_event};
use wpp_store::{StoreResult, consent, integration};

/// Runtime knobs for the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Rows claimed per tick.
    pub batch_size: u32,
    /// Tick cadence in milliseconds.
    pub interval_ms: u64,
    /// Attempts after which a failing row is finalized.
    pub max_attempts: i32,
    /// Treat BLOCKED consent events as opt-outs.
    pub blocked_as_opt_out: bool,
    /// Identifier-validated column on `user` for phone lookups.
    pub user_phone_column: String,
}

impl WorkerSettings {
    /// Settings with the documented defaults, for tests and tools.
    #[must_use]
    pub fn with_defaults(user_phone_column: impl Into<String>) -> Self {
        Self {
            batch_size: 50,
            interval_ms: 1000,
            max_attempts: MAX_ATTEMPTS,
            blocked_as_opt_out: true,
            user_phone_column: user_phone_column.into(),
        }
    }
}

/// How a row left the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    /// Projected into operational state.
    Projected,
    /// Consumed without projection; the reason is recorded on the row.
    Skipped(&'static str),
}

impl Disposition {
    fn annotation(&self) -> Option<&'static str> {
        match self {
            Self::Projected => None,
            Self::Skipped(reason) => Some(reason),
        }
    }
}

/// Retry accounting for a failed attempt: the new attempt count and
/// whether the row is finalized.
#[must_use]
pub fn retry_disposition(attempts_before: i32, max_attempts: i32) -> (i32, bool) {
    let attempts = attempts_before + 1;
    (attempts, attempts > max_attempts)
}

/// Run the worker loop until `shutdown` flips. Ticks are serial; when a
/// tick outlasts the cadence the missed firings are skipped, never
/// overlapped. A failed tick rolls back, logs, and the loop continues.
pub async fn run_worker(
    pool: MySqlPool,
    settings: WorkerSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_millis(settings.interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        batch_size = settings.batch_size,
        interval_ms = settings.interval_ms,
        "webhook_worker_started"
    );
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                match run_tick(&pool, &settings).await {
                    Ok(0) => {}
                    Ok(n) => debug!(claimed = n, "webhook_worker_tick_complete"),
                    Err(err) => error!(error = %err, "webhook_worker_tick_failed"),
                }
            }
        }
    }
    info!("webhook_worker_stopped");
}

/// One tick: claim a batch in a fresh transaction, process each row, and
/// commit everything together.
pub async fn run_tick(pool: &MySqlPool, settings: &WorkerSettings) -> StoreResult<usize> {
    let mut tx = pool.begin().await?;
    let rows = lock_next_batch(&mut *tx, settings.batch_size).await?;
    if rows.is_empty() {
        tx.commit().await?;
        return Ok(0);
    }
    let claimed = rows.len();
    let now = Utc::now().naive_utc();
    for row in &rows {
        process_row(&mut *tx, row, settings, now).await?;
    }
    tx.commit().await?;
    Ok(claimed)
}

/// Process one claimed row: project it, or record the failed attempt.
/// Only the bookkeeping writes can bubble an error up to tick scope.
async fn process_row(
    conn: &mut MySqlConnection,
    row: &RawEventRow,
    settings: &WorkerSettings,
    now: NaiveDateTime,
) -> StoreResult<()> {
    match project_row(conn, row, settings, now).await {
        Ok(disposition) => {
            if let Disposition::Skipped(reason) = &disposition {
                debug!(id = row.id, reason, "webhook_event_skipped");
            }
            mark_processed(conn, row.id, disposition.annotation()).await
        }
        Err(err) => {
            let (attempts, finalize) = retry_disposition(row.attempts, settings.max_attempts);
            warn!(
                id = row.id,
                attempts,
                finalize,
                error = %err,
                "webhook_event_attempt_failed"
            );
            mark_failed_attempt(conn, row.id, attempts, &err.to_string(), finalize).await
        }
    }
}

/// Re-normalize and dispatch a row on its event kind. The persisted
/// payload is authoritative; the denormalized columns are only hints.
async fn project_row(
    conn: &mut MySqlConnection,
    row: &RawEventRow,
    settings: &WorkerSettings,
    now: NaiveDateTime,
) -> StoreResult<Disposition> {
    let Some(payload) = parse_payload_json(row.payload_json.as_ref()) else {
        return Ok(Disposition::Skipped("Unrecognized payload"));
    };
    match normalize(&payload) {
        NormalizedEvent::Message(event) => {
            let Some(status) = event.status else {
                return Ok(Disposition::Skipped("Unrecognized payload"));
            };
            match apply_message_event(conn, &event, status, now).await? {
                ApplyOutcome::Updated | ApplyOutcome::Noop => Ok(Disposition::Projected),
                ApplyOutcome::NotFound => Ok(Disposition::Skipped("Recipient not found")),
            }
        }
        NormalizedEvent::Template(event) => {
            let Some(mapping) = integration::find_active_by_app_id(conn, &row.app_id).await?
            else {
                return Ok(Disposition::Skipped("Integration not found for appId"));
            };
            let Some(status) = event.status else {
                return Ok(Disposition::Skipped("Unrecognized payload"));
            };
            match apply_template_event(conn, mapping.id, mapping.company_id, &event, status, now)
                .await?
            {
                TemplateApplyOutcome::Updated => Ok(Disposition::Projected),
                TemplateApplyOutcome::NotFound => Ok(Disposition::Skipped("Template not found")),
            }
        }
        NormalizedEvent::User(event) => {
            let Some(mapping) = integration::find_active_by_app_id(conn, &row.app_id).await?
            else {
                return Ok(Disposition::Skipped("Integration not found for appId"));
            };
            let Some(phone) = event.phone.as_deref() else {
                return Ok(Disposition::Skipped("Unrecognized payload"));
            };
            let Some(action) = event.action else {
                return Ok(Disposition::Skipped("Unrecognized payload"));
            };
            if action == ConsentAction::Blocked && !settings.blocked_as_opt_out {
                return Ok(Disposition::Skipped("Blocked event ignored by configuration"));
            }
            let Some(user_id) =
                consent::resolve_user_id(conn, &settings.user_phone_column, phone).await?
            else {
                return Ok(Disposition::Skipped("User not found for phone"));
            };
            let event_at = event.event_at.map(|t| t.naive_utc()).unwrap_or(row.received_at);
            consent::insert_consent_event(conn, user_id, mapping.company_id, action, event_at)
                .await?;
            consent::upsert_consent_current(conn, user_id, mapping.company_id, action, event_at)
                .await?;
            Ok(Disposition::Projected)
        }
        NormalizedEvent::Unknown => Ok(Disposition::Skipped("Unrecognized payload")),
    }
}
