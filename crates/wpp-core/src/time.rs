// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timestamp coercion for provider payloads.
//!
//! Providers disagree on timestamp encoding: epoch seconds, epoch
//! milliseconds, and ISO-8601 strings all appear in the wild. Everything
//! is normalized to UTC here, once.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Epoch values at or below this magnitude (ten digits) are seconds.
const EPOCH_SECONDS_MAX: i64 = 9_999_999_999;

/// Coerce a JSON value into a UTC timestamp.
///
/// Accepts integral epoch seconds (≤ 10 digits, scaled ×1000), epoch
/// milliseconds, numeric strings under the same rule, and ISO-8601 /
/// RFC 3339 strings. Anything else yields `None`.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = if let Some(i) = n.as_i64() {
                epoch_to_millis(i)?
            } else {
                // Fractional epoch seconds.
                let f = n.as_f64()?;
                if !f.is_finite() || f <= 0.0 {
                    return None;
                }
                (f * 1000.0) as i64
            };
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if s.bytes().all(|b| b.is_ascii_digit()) {
                let i: i64 = s.parse().ok()?;
                return DateTime::from_timestamp_millis(epoch_to_millis(i)?);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

fn epoch_to_millis(i: i64) -> Option<i64> {
    if i <= 0 {
        return None;
    }
    if i <= EPOCH_SECONDS_MAX {
        i.checked_mul(1000)
    } else {
        Some(i)
    }
}
