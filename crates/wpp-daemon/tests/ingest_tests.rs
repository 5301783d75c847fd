// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ingest endpoint behavior over an in-memory sink.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use wpp_core::EventKind;
use wpp_daemon::{AppState, RawEventSink, build_app};
use wpp_store::StoreResult;
use wpp_store::raw::NewRawEvent;

const SECRET: &str = "shhh";

/// Sink that mimics the raw table's unique dedupe key.
#[derive(Default)]
struct MemorySink {
    events: Mutex<Vec<NewRawEvent>>,
    keys: Mutex<HashSet<String>>,
}

#[async_trait]
impl RawEventSink for MemorySink {
    async fn insert(&self, event: &NewRawEvent) -> StoreResult<bool> {
        let mut keys = self.keys.lock().unwrap();
        if !keys.insert(event.dedupe_key.clone()) {
            return Ok(false);
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(true)
    }
}

fn test_app(sink: Arc<MemorySink>) -> axum::Router {
    build_app(Arc::new(AppState {
        sink,
        secret: SECRET.to_string(),
        preview_chars: 2500,
        verbose_logs: true,
    }))
}

fn ingest_request(secret: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/gupshup/app-1/events")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-gupshup-secret", secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_literal_ok() {
    let app = test_app(Arc::new(MemorySink::default()));
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn missing_secret_is_unauthorized() {
    let sink = Arc::new(MemorySink::default());
    let app = test_app(sink.clone());
    let resp = app.oneshot(ingest_request(None, "{}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(sink.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn wrong_secret_is_unauthorized() {
    let app = test_app(Arc::new(MemorySink::default()));
    let resp = app
        .oneshot(ingest_request(Some("nope"), "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn accepted_event_is_stored_with_hints() {
    let sink = Arc::new(MemorySink::default());
    let app = test_app(sink.clone());
    let body = json!({
        "statuses": [{"id": "gs-1", "status": "delivered", "timestamp": "1739112000"}],
        "eventId": "ev-42"
    })
    .to_string();

    let resp = app
        .oneshot(ingest_request(Some(SECRET), &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"ok": true}));

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.app_id, "app-1");
    assert_eq!(event.event_kind, EventKind::Message);
    assert_eq!(event.hints.message_id.as_deref(), Some("gs-1"));
    assert_eq!(event.hints.provider_event_id.as_deref(), Some("ev-42"));
    assert_eq!(event.hints.event_status.as_deref(), Some("delivered"));
    assert_eq!(event.dedupe_key.len(), 64);
}

#[tokio::test]
async fn duplicate_delivery_acks_without_second_row() {
    let sink = Arc::new(MemorySink::default());
    let body = json!({
        "statuses": [{"id": "gs-1", "status": "delivered", "timestamp": "1739112000"}],
        "eventId": "ev-42"
    })
    .to_string();

    for _ in 0..2 {
        let app = test_app(sink.clone());
        let resp = app
            .oneshot(ingest_request(Some(SECRET), &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"ok": true}));
    }
    assert_eq!(sink.events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn non_json_body_is_wrapped_and_accepted() {
    let sink = Arc::new(MemorySink::default());
    let app = test_app(sink.clone());
    let resp = app
        .oneshot(ingest_request(Some(SECRET), "plain text ping"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_kind, EventKind::Unknown);
    assert_eq!(events[0].payload_json["_format"], "text/plain");
    assert_eq!(events[0].payload_json["_raw"], "plain text ping");
}

#[tokio::test]
async fn empty_body_is_wrapped_and_accepted() {
    let sink = Arc::new(MemorySink::default());
    let app = test_app(sink.clone());
    let resp = app.oneshot(ingest_request(Some(SECRET), "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let events = sink.events.lock().unwrap();
    assert_eq!(events[0].payload_json["_empty"], true);
}

#[tokio::test]
async fn identical_text_bodies_dedupe_by_raw_hash() {
    let sink = Arc::new(MemorySink::default());
    for _ in 0..2 {
        let app = test_app(sink.clone());
        let resp = app
            .oneshot(ingest_request(Some(SECRET), "same opaque body"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    assert_eq!(sink.events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn different_apps_do_not_dedupe_against_each_other() {
    let sink = Arc::new(MemorySink::default());
    let body = json!({"eventId": "ev-1", "statuses": [{"id": "gs", "status": "sent"}]}).to_string();
    for app_id in ["app-a", "app-b"] {
        let app = test_app(sink.clone());
        let req = Request::builder()
            .method("POST")
            .uri(format!("/webhooks/gupshup/{app_id}/events"))
            .header("x-gupshup-secret", SECRET)
            .body(Body::from(body.clone()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    assert_eq!(sink.events.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn template_event_classifies_and_hints() {
    let sink = Arc::new(MemorySink::default());
    let app = test_app(sink.clone());
    let body = json!({
        "template": {"id": "tpl-1", "status": "APPROVED"},
        "event": "template_status"
    })
    .to_string();
    let resp = app
        .oneshot(ingest_request(Some(SECRET), &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let events = sink.events.lock().unwrap();
    assert_eq!(events[0].event_kind, EventKind::Template);
    assert_eq!(events[0].hints.template_provider_id.as_deref(), Some("tpl-1"));
    assert_eq!(events[0].hints.event_status.as_deref(), Some("APPROVED"));
}
