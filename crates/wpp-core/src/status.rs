// SPDX-License-Identifier: MIT OR Apache-2.0
//! Status vocabularies and the monotonic transition rule for recipients.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Message status (provider tokens)
// ---------------------------------------------------------------------------

/// Delivery-receipt status extracted from a message event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Provider accepted the submission.
    Accepted,
    /// Handed to the transport network.
    Sent,
    /// Delivered to the end device.
    Delivered,
    /// Read by the recipient.
    Read,
    /// Delivery failed.
    Failed,
}

impl MessageStatus {
    /// Map a provider token to a status. Case-insensitive; `error` and
    /// `undelivered` collapse into [`MessageStatus::Failed`].
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "accepted" => Some(Self::Accepted),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" | "error" | "undelivered" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Canonical lowercase token for this status.
    #[must_use]
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    /// Recipient status this event moves a row toward.
    #[must_use]
    pub fn target(self) -> RecipientStatus {
        match self {
            Self::Accepted => RecipientStatus::Submitted,
            Self::Sent => RecipientStatus::Sent,
            Self::Delivered => RecipientStatus::Delivered,
            Self::Read => RecipientStatus::Read,
            Self::Failed => RecipientStatus::Failed,
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

// ---------------------------------------------------------------------------
// Recipient status (projected table)
// ---------------------------------------------------------------------------

/// Campaign recipient status as stored in the operational table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientStatus {
    /// Queued, nothing submitted yet.
    Pending,
    /// Excluded from sending.
    Skipped,
    /// Accepted by the provider.
    Submitted,
    /// Handed to the transport network.
    Sent,
    /// Delivered to the device.
    Delivered,
    /// Read by the recipient.
    Read,
    /// Delivery failed.
    Failed,
    /// Scheduled for another send attempt.
    Retrying,
}

impl RecipientStatus {
    /// Ordinal used by the monotonic upgrade rule.
    ///
    /// `FAILED` ranks above everything except `READ`, which it never
    /// overrides; `RETRYING` sits alongside `SUBMITTED`.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending | Self::Skipped => 0,
            Self::Submitted | Self::Retrying => 1,
            Self::Sent => 2,
            Self::Delivered => 3,
            Self::Read => 4,
            Self::Failed => 5,
        }
    }

    /// Database representation.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Skipped => "SKIPPED",
            Self::Submitted => "SUBMITTED",
            Self::Sent => "SENT",
            Self::Delivered => "DELIVERED",
            Self::Read => "READ",
            Self::Failed => "FAILED",
            Self::Retrying => "RETRYING",
        }
    }

    /// Parse the database representation (case-insensitive).
    #[must_use]
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "SKIPPED" => Some(Self::Skipped),
            "SUBMITTED" => Some(Self::Submitted),
            "SENT" => Some(Self::Sent),
            "DELIVERED" => Some(Self::Delivered),
            "READ" => Some(Self::Read),
            "FAILED" => Some(Self::Failed),
            "RETRYING" => Some(Self::Retrying),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

// ---------------------------------------------------------------------------
// Transition rule
// ---------------------------------------------------------------------------

/// Outcome of comparing an incoming event against the current row state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    /// Advance the row to the target status.
    Upgrade,
    /// Same status; metadata may still be refreshed.
    Same,
    /// Drop the status change entirely.
    Ignore,
}

/// Decide how an incoming message status applies to the current recipient
/// status.
///
/// `failed` supersedes anything below `READ`; a row already `READ` ignores
/// late failures, and a row already `FAILED` ignores everything except
/// another failure (which may refresh error metadata).
#[must_use]
pub fn decide_transition(current: RecipientStatus, incoming: MessageStatus) -> TransitionDecision {
    if incoming == MessageStatus::Failed {
        return match current {
            RecipientStatus::Read => TransitionDecision::Ignore,
            RecipientStatus::Failed => TransitionDecision::Same,
            _ => TransitionDecision::Upgrade,
        };
    }
    if current == RecipientStatus::Failed {
        return TransitionDecision::Ignore;
    }
    let target = incoming.target();
    if target.rank() > current.rank() {
        TransitionDecision::Upgrade
    } else if target == current {
        TransitionDecision::Same
    } else {
        TransitionDecision::Ignore
    }
}

// ---------------------------------------------------------------------------
// Template status
// ---------------------------------------------------------------------------

/// Lifecycle status of a message template and its versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateStatus {
    /// Authored but not yet submitted.
    Draft,
    /// Submitted to the provider for review.
    Submitted,
    /// Review in progress on the provider side.
    Pending,
    /// Approved for use.
    Approved,
    /// Rejected by the provider.
    Rejected,
}

impl TemplateStatus {
    /// Map a provider token. `SUBMITTED` and `IN_REVIEW` collapse into
    /// [`TemplateStatus::Submitted`]; unrecognized tokens yield `None`.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "PENDING" => Some(Self::Pending),
            "SUBMITTED" | "IN_REVIEW" => Some(Self::Submitted),
            _ => None,
        }
    }

    /// Database representation.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

/// Consent action carried by a user event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentAction {
    /// User granted marketing consent.
    OptIn,
    /// User revoked marketing consent.
    OptOut,
    /// User blocked the sender. Mapping to opt-out is configuration.
    Blocked,
}

impl ConsentAction {
    /// Map a provider token (case-insensitive).
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "OPT_IN" | "SUBSCRIBE" | "CONSENT_GRANTED" => Some(Self::OptIn),
            "OPT_OUT" | "UNSUBSCRIBE" | "CONSENT_REVOKED" => Some(Self::OptOut),
            "BLOCKED" | "BLOCK" | "USER_BLOCKED" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Database representation for the consent event table.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::OptIn => "OPT_IN",
            Self::OptOut => "OPT_OUT",
            Self::Blocked => "BLOCKED",
        }
    }
}

/// Aggregated consent stance per `(user, company)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentStatus {
    /// No consent event recorded.
    Unknown,
    /// Latest event granted consent.
    OptIn,
    /// Latest event revoked consent.
    OptOut,
}

impl ConsentStatus {
    /// Database representation.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::OptIn => "OPT_IN",
            Self::OptOut => "OPT_OUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- token mapping ---

    #[test]
    fn message_tokens_map_case_insensitively() {
        assert_eq!(MessageStatus::from_token("DELIVERED"), Some(MessageStatus::Delivered));
        assert_eq!(MessageStatus::from_token(" read "), Some(MessageStatus::Read));
        assert_eq!(MessageStatus::from_token("undelivered"), Some(MessageStatus::Failed));
        assert_eq!(MessageStatus::from_token("error"), Some(MessageStatus::Failed));
        assert_eq!(MessageStatus::from_token("enqueued"), None);
    }

    #[test]
    fn template_tokens_collapse_in_review() {
        assert_eq!(TemplateStatus::from_token("IN_REVIEW"), Some(TemplateStatus::Submitted));
        assert_eq!(TemplateStatus::from_token("submitted"), Some(TemplateStatus::Submitted));
        assert_eq!(TemplateStatus::from_token("approved"), Some(TemplateStatus::Approved));
        assert_eq!(TemplateStatus::from_token("DISABLED"), None);
    }

    #[test]
    fn consent_tokens_map_aliases() {
        assert_eq!(ConsentAction::from_token("subscribe"), Some(ConsentAction::OptIn));
        assert_eq!(ConsentAction::from_token("CONSENT_REVOKED"), Some(ConsentAction::OptOut));
        assert_eq!(ConsentAction::from_token("user_blocked"), Some(ConsentAction::Blocked));
        assert_eq!(ConsentAction::from_token("mute"), None);
    }

    // --- rank table ---

    #[test]
    fn recipient_rank_table() {
        assert_eq!(RecipientStatus::Pending.rank(), 0);
        assert_eq!(RecipientStatus::Skipped.rank(), 0);
        assert_eq!(RecipientStatus::Submitted.rank(), 1);
        assert_eq!(RecipientStatus::Retrying.rank(), 1);
        assert_eq!(RecipientStatus::Sent.rank(), 2);
        assert_eq!(RecipientStatus::Delivered.rank(), 3);
        assert_eq!(RecipientStatus::Read.rank(), 4);
        assert_eq!(RecipientStatus::Failed.rank(), 5);
    }

    #[test]
    fn recipient_db_roundtrip() {
        for s in [
            RecipientStatus::Pending,
            RecipientStatus::Skipped,
            RecipientStatus::Submitted,
            RecipientStatus::Sent,
            RecipientStatus::Delivered,
            RecipientStatus::Read,
            RecipientStatus::Failed,
            RecipientStatus::Retrying,
        ] {
            assert_eq!(RecipientStatus::from_db_str(s.as_db_str()), Some(s));
        }
        assert_eq!(RecipientStatus::from_db_str("bogus"), None);
    }

    // --- transition rule ---

    #[test]
    fn upgrade_follows_rank() {
        assert_eq!(
            decide_transition(RecipientStatus::Submitted, MessageStatus::Delivered),
            TransitionDecision::Upgrade
        );
        assert_eq!(
            decide_transition(RecipientStatus::Delivered, MessageStatus::Sent),
            TransitionDecision::Ignore
        );
        assert_eq!(
            decide_transition(RecipientStatus::Sent, MessageStatus::Sent),
            TransitionDecision::Same
        );
    }

    #[test]
    fn failed_overrides_below_read() {
        assert_eq!(
            decide_transition(RecipientStatus::Delivered, MessageStatus::Failed),
            TransitionDecision::Upgrade
        );
        assert_eq!(
            decide_transition(RecipientStatus::Pending, MessageStatus::Failed),
            TransitionDecision::Upgrade
        );
    }

    #[test]
    fn failed_ignored_after_read() {
        assert_eq!(
            decide_transition(RecipientStatus::Read, MessageStatus::Failed),
            TransitionDecision::Ignore
        );
    }

    #[test]
    fn repeated_failure_refreshes_metadata() {
        assert_eq!(
            decide_transition(RecipientStatus::Failed, MessageStatus::Failed),
            TransitionDecision::Same
        );
    }

    #[test]
    fn failed_row_ignores_non_failures() {
        for incoming in [
            MessageStatus::Accepted,
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
        ] {
            assert_eq!(
                decide_transition(RecipientStatus::Failed, incoming),
                TransitionDecision::Ignore
            );
        }
    }

    #[test]
    fn retrying_upgrades_to_sent() {
        assert_eq!(
            decide_transition(RecipientStatus::Retrying, MessageStatus::Sent),
            TransitionDecision::Upgrade
        );
    }

    #[test]
    fn skipped_accepts_submission() {
        assert_eq!(
            decide_transition(RecipientStatus::Skipped, MessageStatus::Accepted),
            TransitionDecision::Upgrade
        );
    }
}
