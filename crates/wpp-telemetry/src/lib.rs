// SPDX-License-Identifier: MIT OR Apache-2.0
//! # wpp-telemetry
//!
//! Structured JSON-lines logging for the webhook pipeline, and the
//! sanitizer applied to any payload fragment before it reaches a log
//! line: secret-bearing keys are redacted, phone numbers are masked to
//! their last four digits, and strings/containers are bounded.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Install the global JSON-lines subscriber honoring `level`
/// (`fatal` collapses into `error`). Call once at startup.
pub fn init(level: &str) {
    let level = match level {
        "fatal" => "error",
        other => other,
    };
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(level))
        .init();
}

// ---------------------------------------------------------------------------
// Sanitizer
// ---------------------------------------------------------------------------

static SENSITIVE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?i)secret|token|password|authorization|auth|cipher|signature|api[-_]?key|bearer")
        .expect("sensitive key regex")
});

static PHONE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)phone|msisdn|wa[-_]?id|whatsapp").expect("phone key regex"));

static PHONE_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s().-]+$").expect("phone value regex"));

/// Bounds applied while sanitizing a value for logging.
#[derive(Debug, Clone, Copy)]
pub struct SanitizeLimits {
    /// Character budget per string before truncation.
    pub max_string: usize,
    /// Nesting depth before a subtree collapses to a marker.
    pub max_depth: usize,
    /// Entries kept per array or object.
    pub max_items: usize,
}

impl Default for SanitizeLimits {
    fn default() -> Self {
        Self {
            max_string: 256,
            max_depth: 6,
            max_items: 50,
        }
    }
}

/// Whether `key` names something secret-bearing.
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEY_RE.is_match(key)
}

/// Whether a string value looks like a phone number: optional `+`, then
/// digits with common separators, 8–15 digits total.
#[must_use]
pub fn looks_like_phone(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() || !PHONE_VALUE_RE.is_match(trimmed) {
        return false;
    }
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    (8..=15).contains(&digits)
}

/// Mask a phone-like string down to `***<last4>`.
#[must_use]
pub fn mask_phone(value: &str) -> String {
    let digits: Vec<char> = value.chars().filter(char::is_ascii_digit).collect();
    let tail: String = digits.iter().rev().take(4).rev().collect();
    format!("***{tail}")
}

/// Sanitize a JSON value for logging under the given limits.
///
/// Keys matching the sensitive pattern are replaced with `[REDACTED]`
/// regardless of value shape; phone-keyed or phone-shaped strings are
/// masked; long strings are truncated with a `[truncated:N]` marker; deep
/// or wide containers are capped.
#[must_use]
pub fn sanitize(value: &Value, limits: &SanitizeLimits) -> Value {
    sanitize_at(value, limits, 0, false)
}

fn sanitize_at(value: &Value, limits: &SanitizeLimits, depth: usize, phone_context: bool) -> Value {
    if depth > limits.max_depth {
        return Value::String("[MaxDepth]".to_string());
    }
    match value {
        Value::String(s) => {
            if phone_context || looks_like_phone(s) {
                return Value::String(mask_phone(s));
            }
            sanitize_string(s, limits.max_string)
        }
        Value::Number(n) => {
            // Phone numbers occasionally arrive as bare integers; only a
            // phone-named key marks them (a 10-digit number could just as
            // well be an epoch timestamp).
            if phone_context {
                return Value::String(mask_phone(&n.to_string()));
            }
            value.clone()
        }
        Value::Array(items) => {
            let kept: Vec<Value> = items
                .iter()
                .take(limits.max_items)
                .map(|v| sanitize_at(v, limits, depth + 1, phone_context))
                .collect();
            let mut out = kept;
            if items.len() > limits.max_items {
                out.push(json!(format!("[truncated:{}]", items.len() - limits.max_items)));
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (i, (k, v)) in map.iter().enumerate() {
                if i >= limits.max_items {
                    out.insert(
                        "[truncated]".to_string(),
                        json!(format!("{} more entries", map.len() - limits.max_items)),
                    );
                    break;
                }
                if is_sensitive_key(k) {
                    out.insert(k.clone(), json!("[REDACTED]"));
                    continue;
                }
                let is_phone_key = PHONE_KEY_RE.is_match(k);
                out.insert(k.clone(), sanitize_at(v, limits, depth + 1, is_phone_key));
            }
            Value::Object(out)
        }
        _ => value.clone(),
    }
}

fn sanitize_string(s: &str, max_chars: usize) -> Value {
    let total = s.chars().count();
    if total <= max_chars {
        return Value::String(s.to_string());
    }
    let kept: String = s.chars().take(max_chars).collect();
    Value::String(format!("{kept}[truncated:{}]", total - max_chars))
}

/// Render a sanitized, bounded preview of a payload for log lines.
#[must_use]
pub fn payload_preview(value: &Value, max_chars: usize) -> String {
    let sanitized = sanitize(value, &SanitizeLimits::default());
    let rendered = sanitized.to_string();
    let total = rendered.chars().count();
    if total <= max_chars {
        return rendered;
    }
    let kept: String = rendered.chars().take(max_chars).collect();
    format!("{kept}[truncated:{}]", total - max_chars)
}
