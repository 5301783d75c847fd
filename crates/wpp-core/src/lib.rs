// SPDX-License-Identifier: MIT OR Apache-2.0
//! # wpp-core
//!
//! Typed contract for the webhook pipeline: the normalized event model,
//! the status machines projected into operational tables, timestamp and
//! phone coercion, and the deterministic dedupe-key construction.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dedupe;
pub mod event;
pub mod status;
pub mod time;

pub use dedupe::{DedupeInput, build_dedupe_key, sha256_hex};
pub use event::{
    EventKind, MessageEvent, NormalizedEvent, RawHints, TemplateEvent, UserEvent, normalize_phone,
};
pub use status::{
    ConsentAction, ConsentStatus, MessageStatus, RecipientStatus, TemplateStatus,
    TransitionDecision, decide_transition,
};
pub use time::parse_timestamp;

/// Maximum retry attempts before a raw event is finalized as failed.
pub const MAX_ATTEMPTS: i32 = 10;

/// Bound applied to anything persisted into the raw row's `last_error`.
pub const LAST_ERROR_MAX_CHARS: usize = 255;

/// Truncate an error description to [`LAST_ERROR_MAX_CHARS`] on a char
/// boundary.
#[must_use]
pub fn truncate_error(message: &str) -> String {
    if message.chars().count() <= LAST_ERROR_MAX_CHARS {
        return message.to_string();
    }
    message.chars().take(LAST_ERROR_MAX_CHARS).collect()
}
