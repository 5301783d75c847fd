// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic dedupe-key construction.
//!
//! The key is the SHA-256 hex digest of a material string chosen by a
//! fixed precedence: provider event id, then message lookup hints, then
//! the full raw request body. Identical inputs always produce identical
//! keys, so dedupe survives restarts and replays.

use crate::event::EventKind;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Inputs that feed the dedupe-key material.
#[derive(Debug, Clone, Copy)]
pub struct DedupeInput<'a> {
    /// Producer account id from the URL path.
    pub app_id: &'a str,
    /// Classified event kind.
    pub kind: EventKind,
    /// Provider event id, if the payload carries one.
    pub provider_event_id: Option<&'a str>,
    /// Provider message id hint.
    pub message_id: Option<&'a str>,
    /// Status token hint.
    pub event_status: Option<&'a str>,
    /// Event timestamp hint.
    pub event_at: Option<DateTime<Utc>>,
    /// Exact raw request body.
    pub raw_body: &'a str,
}

/// Build the 64-hex dedupe key for an inbound event.
#[must_use]
pub fn build_dedupe_key(input: &DedupeInput<'_>) -> String {
    sha256_hex(material(input).as_bytes())
}

fn material(input: &DedupeInput<'_>) -> String {
    let kind = input.kind.as_db_str();
    if let Some(event_id) = non_empty(input.provider_event_id) {
        return format!("{}|{}|{}", input.app_id, kind, event_id);
    }
    let message_id = non_empty(input.message_id);
    let status = non_empty(input.event_status);
    if message_id.is_some() || status.is_some() || input.event_at.is_some() {
        let ts = input
            .event_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();
        return format!(
            "{}|{}|{}|{}|{}",
            input.app_id,
            kind,
            message_id.unwrap_or_default(),
            status.unwrap_or_default(),
            ts
        );
    }
    input.raw_body.to_string()
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}
