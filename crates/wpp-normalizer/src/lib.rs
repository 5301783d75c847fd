// SPDX-License-Identifier: MIT OR Apache-2.0
//! # wpp-normalizer
//!
//! Schema-tolerant extraction of a typed [`NormalizedEvent`] from the
//! heterogeneous payload shapes WhatsApp BSPs emit. Two lookup strategies
//! combine: a prioritized dotted-path probe (first non-empty wins) and a
//! breadth-first case-insensitive key search used as fallback.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod paths;
mod probe;

pub use probe::{is_empty_value, probe_path, search_keys, value_to_string};

use paths::*;
use serde_json::Value;
use wpp_core::{
    ConsentAction, MessageEvent, MessageStatus, NormalizedEvent, TemplateEvent, TemplateStatus,
    UserEvent, normalize_phone, parse_timestamp,
};

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

/// Probe `paths` in order, then fall back to a BFS search over `keys`;
/// returns the first non-empty string rendering.
fn extract_str(root: &Value, paths: &[&str], keys: &[&str]) -> Option<String> {
    for path in paths {
        if let Some(s) = probe_path(root, path).and_then(value_to_string) {
            return Some(s);
        }
    }
    if keys.is_empty() {
        return None;
    }
    search_keys(root, keys).and_then(value_to_string)
}

fn extract_timestamp(root: &Value, paths: &[&str]) -> Option<chrono::DateTime<chrono::Utc>> {
    for path in paths {
        if let Some(ts) = probe_path(root, path).and_then(parse_timestamp) {
            return Some(ts);
        }
    }
    None
}

fn extract_value(root: &Value, paths: &[&str]) -> Option<Value> {
    for path in paths {
        if let Some(v) = probe_path(root, path) {
            return Some(v.clone());
        }
    }
    None
}

/// Top-level event-type hint, lowercased (`event`, `type`, `eventType`…).
fn event_type_hint(root: &Value) -> Option<String> {
    let obj = root.as_object()?;
    for key in EVENT_HINT_KEYS {
        if let Some(s) = obj.get(*key).and_then(value_to_string) {
            return Some(s.to_ascii_lowercase());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Per-domain signal gathering
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TemplateSignals {
    status_token: Option<String>,
    status: Option<TemplateStatus>,
    name: Option<String>,
    provider_id: Option<String>,
}

fn template_signals(root: &Value) -> TemplateSignals {
    let status_token = extract_str(root, TEMPLATE_STATUS_PATHS, &[]);
    let status = status_token.as_deref().and_then(TemplateStatus::from_token);
    TemplateSignals {
        status_token,
        status,
        name: extract_str(root, TEMPLATE_NAME_PATHS, TEMPLATE_NAME_KEYS),
        provider_id: extract_str(root, TEMPLATE_ID_PATHS, TEMPLATE_ID_KEYS),
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Classify a payload and extract the matching typed variant.
///
/// Variants are tried in a fixed order — template, message, user — and the
/// first match wins; payloads with no usable signal come back as
/// [`NormalizedEvent::Unknown`].
#[must_use]
pub fn normalize(payload: &Value) -> NormalizedEvent {
    let hint = event_type_hint(payload);
    let hint_mentions_template = hint.as_deref().is_some_and(|h| h.contains("template"));

    // 1. Template: any template signal, gated on a recognized status or an
    //    explicit event-type hint.
    let tpl = template_signals(payload);
    let template_signal =
        tpl.status_token.is_some() || tpl.name.is_some() || tpl.provider_id.is_some();
    if template_signal && (tpl.status.is_some() || hint_mentions_template) {
        return NormalizedEvent::Template(TemplateEvent {
            name: tpl.name,
            provider_template_id: tpl.provider_id,
            language: extract_str(payload, TEMPLATE_LANG_PATHS, &[]),
            status: tpl.status,
            rejection_reason: extract_str(payload, TEMPLATE_REJECT_REASON_PATHS, &[]),
            correct_category: extract_str(payload, TEMPLATE_CORRECT_CATEGORY_PATHS, &[]),
            provider_event_id: extract_str(payload, PROVIDER_EVENT_ID_PATHS, PROVIDER_EVENT_ID_KEYS),
            event_at: extract_timestamp(payload, TEMPLATE_TS_PATHS),
        });
    }

    // 2. Message: at least one of message id / whatsapp id / recognized
    //    status token, unless a template name without any message id
    //    dominates the payload.
    let message_id = extract_str(payload, MESSAGE_ID_PATHS, MESSAGE_ID_KEYS);
    let whatsapp_message_id = extract_str(payload, WHATSAPP_ID_PATHS, WHATSAPP_ID_KEYS);
    let message_status = extract_str(payload, MESSAGE_STATUS_PATHS, &[])
        .as_deref()
        .and_then(MessageStatus::from_token);
    let template_dominates =
        tpl.name.is_some() && message_id.is_none() && whatsapp_message_id.is_none();
    if (message_id.is_some() || whatsapp_message_id.is_some() || message_status.is_some())
        && !template_dominates
    {
        return NormalizedEvent::Message(MessageEvent {
            message_id,
            whatsapp_message_id,
            status: message_status,
            event_at: extract_timestamp(payload, MESSAGE_TS_PATHS),
            provider_event_id: extract_str(payload, PROVIDER_EVENT_ID_PATHS, PROVIDER_EVENT_ID_KEYS),
            error_code: extract_str(payload, ERROR_CODE_PATHS, &[]),
            error_reason: extract_str(payload, ERROR_REASON_PATHS, &[]),
            error_payload: extract_value(payload, ERROR_PAYLOAD_PATHS),
        });
    }

    // 3. User: a consent token or a phone-like field.
    let action = extract_str(payload, CONSENT_PATHS, &[])
        .as_deref()
        .and_then(ConsentAction::from_token);
    let phone = extract_str(payload, PHONE_PATHS, PHONE_KEYS)
        .as_deref()
        .and_then(normalize_phone);
    if action.is_some() || phone.is_some() {
        return NormalizedEvent::User(UserEvent {
            phone,
            action,
            event_at: extract_timestamp(payload, USER_TS_PATHS),
            provider_event_id: extract_str(payload, PROVIDER_EVENT_ID_PATHS, PROVIDER_EVENT_ID_KEYS),
        });
    }

    NormalizedEvent::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_hint_reads_top_level_keys_only() {
        assert_eq!(
            event_type_hint(&json!({"event": "Template_Status"})).as_deref(),
            Some("template_status")
        );
        assert_eq!(event_type_hint(&json!({"nested": {"event": "x"}})), None);
        assert_eq!(event_type_hint(&json!("scalar")), None);
    }

    #[test]
    fn extract_str_prefers_paths_over_key_search() {
        let payload = json!({
            "statuses": [{"id": "from-path"}],
            "deep": {"messageId": "from-bfs"}
        });
        assert_eq!(
            extract_str(&payload, MESSAGE_ID_PATHS, MESSAGE_ID_KEYS).as_deref(),
            Some("from-path")
        );
    }

    #[test]
    fn extract_str_falls_back_to_key_search() {
        let payload = json!({"deep": {"nested": {"messageId": "bfs-hit"}}});
        assert_eq!(
            extract_str(&payload, MESSAGE_ID_PATHS, MESSAGE_ID_KEYS).as_deref(),
            Some("bfs-hit")
        );
    }
}
