// SPDX-License-Identifier: MIT OR Apache-2.0
//! # wpp-daemon
//!
//! HTTP ingest for provider webhooks. The endpoint authenticates with a
//! shared secret, captures the exact raw body, classifies it, builds the
//! deterministic dedupe key, and appends to the raw buffer — then ACKs.
//! Everything else (projection, retries) happens asynchronously in the
//! worker.
#![deny(unsafe_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path as AxPath, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use sqlx::mysql::MySqlPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use wpp_core::{DedupeInput, build_dedupe_key};
use wpp_normalizer::normalize;
use wpp_store::StoreResult;
use wpp_store::raw::{NewRawEvent, insert_raw_event};
use wpp_telemetry::payload_preview;

/// Header carrying the shared ingest secret.
pub const SECRET_HEADER: &str = "x-gupshup-secret";

/// Header consulted for request correlation (logging only).
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ---------------------------------------------------------------------------
// Sink seam
// ---------------------------------------------------------------------------

/// Destination for accepted raw events. The daemon only ever appends;
/// tests swap in an in-memory implementation.
#[async_trait]
pub trait RawEventSink: Send + Sync {
    /// Insert an event; `false` means the dedupe key already existed.
    async fn insert(&self, event: &NewRawEvent) -> StoreResult<bool>;
}

/// Pool-backed sink used in production.
pub struct SqlRawEventSink {
    pool: MySqlPool,
}

impl SqlRawEventSink {
    /// Wrap a pool.
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RawEventSink for SqlRawEventSink {
    async fn insert(&self, event: &NewRawEvent) -> StoreResult<bool> {
        insert_raw_event(&self.pool, event).await
    }
}

// ---------------------------------------------------------------------------
// State and errors
// ---------------------------------------------------------------------------

/// Shared handler state.
pub struct AppState {
    /// Where accepted events land.
    pub sink: Arc<dyn RawEventSink>,
    /// Configured shared secret.
    pub secret: String,
    /// Character budget for logged payload previews.
    pub preview_chars: usize,
    /// Emit payload previews at info level.
    pub verbose_logs: bool,
}

/// Structured HTTP error.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status to surface.
    pub status: StatusCode,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Create an error response.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

/// Build the Axum router with the ingest and liveness routes.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(cmd_health))
        .route("/webhooks/gupshup/{app_id}/events", post(cmd_ingest))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn cmd_health() -> &'static str {
    "ok"
}

async fn cmd_ingest(
    State(state): State<Arc<AppState>>,
    AxPath(app_id): AxPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let presented = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !constant_time_eq(presented.as_bytes(), state.secret.as_bytes()) {
        warn!(request_id = %request_id, app_id = %app_id, "webhook_rejected");
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid secret"));
    }

    // The raw bytes are the dedupe fallback material; capture them before
    // any parsing can reshape the body.
    let raw_body = String::from_utf8_lossy(&body).into_owned();
    let payload = wrap_raw_body(&raw_body);
    let event = normalize(&payload);
    let kind = event.kind();
    let hints = event.hints();

    let dedupe_key = build_dedupe_key(&DedupeInput {
        app_id: &app_id,
        kind,
        provider_event_id: hints.provider_event_id.as_deref(),
        message_id: hints.message_id.as_deref(),
        event_status: hints.event_status.as_deref(),
        event_at: event.event_at(),
        raw_body: &raw_body,
    });

    let new_event = NewRawEvent {
        app_id: app_id.clone(),
        event_kind: kind,
        hints,
        payload_json: payload,
        dedupe_key: dedupe_key.clone(),
    };

    let inserted = state.sink.insert(&new_event).await.map_err(|err| {
        error!(request_id = %request_id, app_id = %app_id, error = %err, "webhook_insert_failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })?;

    if inserted {
        if state.verbose_logs {
            info!(
                request_id = %request_id,
                app_id = %app_id,
                kind = %kind,
                dedupe_key = %dedupe_key,
                content_length = body.len(),
                payload = %payload_preview(&new_event.payload_json, state.preview_chars),
                "webhook_received"
            );
        } else {
            info!(
                request_id = %request_id,
                app_id = %app_id,
                kind = %kind,
                dedupe_key = %dedupe_key,
                content_length = body.len(),
                "webhook_received"
            );
        }
    } else {
        info!(
            request_id = %request_id,
            app_id = %app_id,
            kind = %kind,
            dedupe_key = %dedupe_key,
            "webhook_duplicate_ignored"
        );
    }

    Ok(Json(json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// Body handling
// ---------------------------------------------------------------------------

/// Parse the captured body per the ingest contract: empty bodies and
/// non-JSON text are wrapped rather than rejected.
#[must_use]
pub fn wrap_raw_body(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({ "_raw": raw, "_empty": true });
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(parsed) => parsed,
        Err(_) => json!({ "_raw": raw, "_format": "text/plain" }),
    }
}

/// Constant-time byte comparison for the shared secret.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
