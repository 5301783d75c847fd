// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consent projection: append-only consent events and the per-user
//! aggregate, folded under a row lock.

use crate::{StoreError, StoreResult};
use chrono::NaiveDateTime;
use sqlx::Row;
use sqlx::mysql::MySqlConnection;
use wpp_config::is_valid_identifier;
use wpp_core::{ConsentAction, ConsentStatus};

/// Aggregate state for a `(user, company)` pair after folding an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentAggregate {
    /// Most recent opt-in time.
    pub last_opt_in_at: Option<NaiveDateTime>,
    /// Most recent opt-out time.
    pub last_opt_out_at: Option<NaiveDateTime>,
    /// Derived stance.
    pub status: ConsentStatus,
}

/// Fold a consent event into the existing aggregate timestamps.
///
/// The status derives purely from the two high-water marks; equal marks
/// resolve to opt-in. `Blocked` reaches this point only when configured
/// to count as an opt-out, so it folds as one.
#[must_use]
pub fn fold_consent(
    existing: Option<(Option<NaiveDateTime>, Option<NaiveDateTime>)>,
    action: ConsentAction,
    event_at: NaiveDateTime,
) -> ConsentAggregate {
    let (mut opt_in, mut opt_out) = existing.unwrap_or((None, None));
    match action {
        ConsentAction::OptIn => opt_in = Some(opt_in.map_or(event_at, |t| t.max(event_at))),
        ConsentAction::OptOut | ConsentAction::Blocked => {
            opt_out = Some(opt_out.map_or(event_at, |t| t.max(event_at)));
        }
    }
    let status = match (opt_in, opt_out) {
        (None, None) => ConsentStatus::Unknown,
        (Some(_), None) => ConsentStatus::OptIn,
        (None, Some(_)) => ConsentStatus::OptOut,
        (Some(i), Some(o)) => {
            if i >= o {
                ConsentStatus::OptIn
            } else {
                ConsentStatus::OptOut
            }
        }
    };
    ConsentAggregate {
        last_opt_in_at: opt_in,
        last_opt_out_at: opt_out,
        status,
    }
}

/// Resolve a user id by phone, via the externally configured column.
///
/// The column name was validated at startup; it is re-checked here before
/// interpolation as the last line of defense.
pub async fn resolve_user_id(
    conn: &mut MySqlConnection,
    phone_column: &str,
    phone: &str,
) -> StoreResult<Option<u64>> {
    if !is_valid_identifier(phone_column) {
        return Err(StoreError::InvalidColumn(phone_column.to_string()));
    }
    let row = sqlx::query(&format!(
        "SELECT id FROM `user` WHERE `{phone_column}` = ? LIMIT 1"
    ))
    .bind(phone)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|r| r.get::<u64, _>("id")))
}

/// Append a consent event row.
pub async fn insert_consent_event(
    conn: &mut MySqlConnection,
    user_id: u64,
    company_id: u64,
    action: ConsentAction,
    event_at: NaiveDateTime,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO marketing_consent_event (user_id, company_id, event_type, event_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(company_id)
    .bind(normalized_event_type(action))
    .bind(event_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Event type persisted for the append-only log. `Blocked` is recorded as
/// the opt-out it was configured to mean.
fn normalized_event_type(action: ConsentAction) -> &'static str {
    match action {
        ConsentAction::OptIn => "OPT_IN",
        ConsentAction::OptOut | ConsentAction::Blocked => "OPT_OUT",
    }
}

/// Upsert the consent aggregate under a row lock on `(user, company)`.
pub async fn upsert_consent_current(
    conn: &mut MySqlConnection,
    user_id: u64,
    company_id: u64,
    action: ConsentAction,
    event_at: NaiveDateTime,
) -> StoreResult<ConsentAggregate> {
    let existing = sqlx::query(
        "SELECT last_opt_in_at, last_opt_out_at FROM marketing_consent_current \
         WHERE user_id = ? AND company_id = ? \
         FOR UPDATE",
    )
    .bind(user_id)
    .bind(company_id)
    .fetch_optional(&mut *conn)
    .await?;

    let prior = existing.as_ref().map(|row| {
        (
            row.get::<Option<NaiveDateTime>, _>("last_opt_in_at"),
            row.get::<Option<NaiveDateTime>, _>("last_opt_out_at"),
        )
    });
    let aggregate = fold_consent(prior, action, event_at);

    if existing.is_some() {
        sqlx::query(
            "UPDATE marketing_consent_current \
             SET status = ?, last_opt_in_at = ?, last_opt_out_at = ?, updated_at = UTC_TIMESTAMP() \
             WHERE user_id = ? AND company_id = ?",
        )
        .bind(aggregate.status.as_db_str())
        .bind(aggregate.last_opt_in_at)
        .bind(aggregate.last_opt_out_at)
        .bind(user_id)
        .bind(company_id)
        .execute(&mut *conn)
        .await?;
    } else {
        sqlx::query(
            "INSERT INTO marketing_consent_current \
             (user_id, company_id, status, last_opt_in_at, last_opt_out_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, UTC_TIMESTAMP())",
        )
        .bind(user_id)
        .bind(company_id)
        .bind(aggregate.status.as_db_str())
        .bind(aggregate.last_opt_in_at)
        .bind(aggregate.last_opt_out_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn at(secs: i64) -> NaiveDateTime {
        DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    #[test]
    fn first_opt_in_from_nothing() {
        let agg = fold_consent(None, ConsentAction::OptIn, at(100));
        assert_eq!(agg.status, ConsentStatus::OptIn);
        assert_eq!(agg.last_opt_in_at, Some(at(100)));
        assert_eq!(agg.last_opt_out_at, None);
    }

    #[test]
    fn newer_opt_out_wins() {
        let agg = fold_consent(Some((Some(at(100)), None)), ConsentAction::OptOut, at(200));
        assert_eq!(agg.status, ConsentStatus::OptOut);
        assert_eq!(agg.last_opt_in_at, Some(at(100)));
        assert_eq!(agg.last_opt_out_at, Some(at(200)));
    }

    #[test]
    fn stale_opt_out_does_not_flip_status() {
        let agg = fold_consent(Some((Some(at(300)), None)), ConsentAction::OptOut, at(200));
        assert_eq!(agg.status, ConsentStatus::OptIn);
        assert_eq!(agg.last_opt_out_at, Some(at(200)));
    }

    #[test]
    fn tie_resolves_to_opt_in() {
        let agg = fold_consent(Some((Some(at(100)), None)), ConsentAction::OptOut, at(100));
        assert_eq!(agg.status, ConsentStatus::OptIn);
    }

    #[test]
    fn high_water_marks_never_regress() {
        let agg = fold_consent(
            Some((Some(at(500)), Some(at(400)))),
            ConsentAction::OptIn,
            at(100),
        );
        assert_eq!(agg.last_opt_in_at, Some(at(500)));
        assert_eq!(agg.last_opt_out_at, Some(at(400)));
        assert_eq!(agg.status, ConsentStatus::OptIn);
    }

    #[test]
    fn blocked_folds_as_opt_out() {
        let agg = fold_consent(Some((Some(at(100)), None)), ConsentAction::Blocked, at(200));
        assert_eq!(agg.status, ConsentStatus::OptOut);
        assert_eq!(agg.last_opt_out_at, Some(at(200)));
    }

    #[test]
    fn event_type_normalization() {
        assert_eq!(normalized_event_type(ConsentAction::OptIn), "OPT_IN");
        assert_eq!(normalized_event_type(ConsentAction::OptOut), "OPT_OUT");
        assert_eq!(normalized_event_type(ConsentAction::Blocked), "OPT_OUT");
    }
}
