// SPDX-License-Identifier: MIT OR Apache-2.0
//! Normalized event variants and the denormalized lookup hints persisted
//! alongside the raw payload.

use crate::status::{ConsentAction, MessageStatus, TemplateStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Event kind
// ---------------------------------------------------------------------------

/// Coarse classification of an inbound webhook payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Delivery receipt for an outbound message.
    Message,
    /// Template lifecycle event.
    Template,
    /// Consent / user-state event.
    User,
    /// Could not be classified.
    Unknown,
}

impl EventKind {
    /// Database representation.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Template => "TEMPLATE",
            Self::User => "USER",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse the database representation (case-insensitive).
    #[must_use]
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MESSAGE" => Some(Self::Message),
            "TEMPLATE" => Some(Self::Template),
            "USER" => Some(Self::User),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Delivery receipt extracted from a message event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Provider-assigned message id.
    pub message_id: Option<String>,
    /// WhatsApp network message id.
    pub whatsapp_message_id: Option<String>,
    /// Recognized delivery status, if any.
    pub status: Option<MessageStatus>,
    /// Event timestamp from the payload.
    pub event_at: Option<DateTime<Utc>>,
    /// Provider event id used for dedupe when present.
    pub provider_event_id: Option<String>,
    /// Provider error code on failures.
    pub error_code: Option<String>,
    /// Provider error description on failures.
    pub error_reason: Option<String>,
    /// Raw error object when the payload carries one.
    pub error_payload: Option<Value>,
}

/// Template lifecycle change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateEvent {
    /// Template name.
    pub name: Option<String>,
    /// Provider-side template id.
    pub provider_template_id: Option<String>,
    /// Template language code.
    pub language: Option<String>,
    /// Recognized template status, if any.
    pub status: Option<TemplateStatus>,
    /// Rejection reason, populated on rejections.
    pub rejection_reason: Option<String>,
    /// Category the provider reassigned the template to.
    pub correct_category: Option<String>,
    /// Provider event id used for dedupe when present.
    pub provider_event_id: Option<String>,
    /// Event timestamp from the payload.
    pub event_at: Option<DateTime<Utc>>,
}

/// Consent / user-state change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    /// Phone number as carried by the payload (whitespace-stripped).
    pub phone: Option<String>,
    /// Recognized consent action, if any.
    pub action: Option<ConsentAction>,
    /// Event timestamp from the payload.
    pub event_at: Option<DateTime<Utc>>,
    /// Provider event id used for dedupe when present.
    pub provider_event_id: Option<String>,
}

/// Tagged union produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalizedEvent {
    /// Delivery receipt.
    Message(MessageEvent),
    /// Template lifecycle event.
    Template(TemplateEvent),
    /// Consent / user-state event.
    User(UserEvent),
    /// Unclassifiable payload.
    Unknown,
}

impl NormalizedEvent {
    /// Coarse kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Template(_) => EventKind::Template,
            Self::User(_) => EventKind::User,
            Self::Unknown => EventKind::Unknown,
        }
    }

    /// Provider event id, whichever variant carries it.
    #[must_use]
    pub fn provider_event_id(&self) -> Option<&str> {
        match self {
            Self::Message(m) => m.provider_event_id.as_deref(),
            Self::Template(t) => t.provider_event_id.as_deref(),
            Self::User(u) => u.provider_event_id.as_deref(),
            Self::Unknown => None,
        }
    }

    /// Event timestamp, whichever variant carries it.
    #[must_use]
    pub fn event_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Message(m) => m.event_at,
            Self::Template(t) => t.event_at,
            Self::User(u) => u.event_at,
            Self::Unknown => None,
        }
    }

    /// Denormalized lookup hints for the raw row columns.
    #[must_use]
    pub fn hints(&self) -> RawHints {
        match self {
            Self::Message(m) => RawHints {
                provider_event_id: m.provider_event_id.clone(),
                message_id: m.message_id.clone(),
                whatsapp_message_id: m.whatsapp_message_id.clone(),
                event_status: m.status.map(|s| s.as_token().to_string()),
                ..RawHints::default()
            },
            Self::Template(t) => RawHints {
                provider_event_id: t.provider_event_id.clone(),
                template_name: t.name.clone(),
                template_provider_id: t.provider_template_id.clone(),
                event_status: t.status.map(|s| s.as_db_str().to_string()),
                ..RawHints::default()
            },
            Self::User(u) => RawHints {
                provider_event_id: u.provider_event_id.clone(),
                event_status: u.action.map(|a| a.as_db_str().to_string()),
                ..RawHints::default()
            },
            Self::Unknown => RawHints::default(),
        }
    }
}

/// Nullable denormalized columns stored on the raw row. The payload stays
/// authoritative; these only speed up lookups and debugging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHints {
    /// Provider event id.
    pub provider_event_id: Option<String>,
    /// Provider message id.
    pub message_id: Option<String>,
    /// WhatsApp network message id.
    pub whatsapp_message_id: Option<String>,
    /// Template name.
    pub template_name: Option<String>,
    /// Provider-side template id.
    pub template_provider_id: Option<String>,
    /// Status token as extracted.
    pub event_status: Option<String>,
}

// ---------------------------------------------------------------------------
// Phone normalization
// ---------------------------------------------------------------------------

/// Strip all whitespace from a phone field. Empty results collapse to
/// `None`; full E.164 validation happens at projection-time lookup, not
/// here.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_db_roundtrip() {
        for k in [
            EventKind::Message,
            EventKind::Template,
            EventKind::User,
            EventKind::Unknown,
        ] {
            assert_eq!(EventKind::from_db_str(k.as_db_str()), Some(k));
        }
    }

    #[test]
    fn message_hints_carry_ids_and_status() {
        let ev = NormalizedEvent::Message(MessageEvent {
            message_id: Some("gs-1".into()),
            whatsapp_message_id: Some("wamid.X".into()),
            status: Some(MessageStatus::Delivered),
            provider_event_id: Some("ev-42".into()),
            ..MessageEvent::default()
        });
        let hints = ev.hints();
        assert_eq!(hints.message_id.as_deref(), Some("gs-1"));
        assert_eq!(hints.whatsapp_message_id.as_deref(), Some("wamid.X"));
        assert_eq!(hints.event_status.as_deref(), Some("delivered"));
        assert_eq!(hints.provider_event_id.as_deref(), Some("ev-42"));
        assert!(hints.template_name.is_none());
    }

    #[test]
    fn template_hints_carry_template_columns() {
        let ev = NormalizedEvent::Template(TemplateEvent {
            name: Some("welcome".into()),
            provider_template_id: Some("tpl-1".into()),
            status: Some(TemplateStatus::Approved),
            ..TemplateEvent::default()
        });
        let hints = ev.hints();
        assert_eq!(hints.template_name.as_deref(), Some("welcome"));
        assert_eq!(hints.template_provider_id.as_deref(), Some("tpl-1"));
        assert_eq!(hints.event_status.as_deref(), Some("APPROVED"));
        assert!(hints.message_id.is_none());
    }

    #[test]
    fn unknown_hints_are_empty() {
        assert_eq!(NormalizedEvent::Unknown.hints(), RawHints::default());
    }

    #[test]
    fn normalize_phone_strips_whitespace() {
        assert_eq!(normalize_phone(" +1 555 123 4567 ").as_deref(), Some("+15551234567"));
        assert_eq!(normalize_phone("\t\n"), None);
        assert_eq!(normalize_phone(""), None);
    }
}
