// SPDX-License-Identifier: MIT OR Apache-2.0
//! Template projection: mirror provider lifecycle changes onto the
//! template row and its latest version.

use crate::StoreResult;
use chrono::NaiveDateTime;
use sqlx::mysql::MySqlConnection;
use wpp_core::{TemplateEvent, TemplateStatus};

/// Result of applying a template event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateApplyOutcome {
    /// Template (and latest version, when present) updated.
    Updated,
    /// No template matched the event's identity.
    NotFound,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TemplateIdRow {
    id: u64,
}

/// Latest version row, restricted to projection columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TemplateVersionRow {
    /// Primary key.
    pub id: u64,
    /// First submission time.
    pub submitted_at: Option<NaiveDateTime>,
    /// First approval time.
    pub approved_at: Option<NaiveDateTime>,
    /// First rejection time.
    pub rejected_at: Option<NaiveDateTime>,
}

/// First-occurrence stamps for a version after applying `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionStamps {
    /// `submitted_at` after the fill.
    pub submitted_at: Option<NaiveDateTime>,
    /// `approved_at` after the fill.
    pub approved_at: Option<NaiveDateTime>,
    /// `rejected_at` after the fill.
    pub rejected_at: Option<NaiveDateTime>,
}

/// Fill the version's first-occurrence timestamp for `status`, leaving
/// already-set stamps untouched.
#[must_use]
pub fn version_stamps(
    row: &TemplateVersionRow,
    status: TemplateStatus,
    stamp: NaiveDateTime,
) -> VersionStamps {
    let mut out = VersionStamps {
        submitted_at: row.submitted_at,
        approved_at: row.approved_at,
        rejected_at: row.rejected_at,
    };
    match status {
        TemplateStatus::Submitted | TemplateStatus::Pending => {
            out.submitted_at = out.submitted_at.or(Some(stamp));
        }
        TemplateStatus::Approved => {
            out.approved_at = out.approved_at.or(Some(stamp));
        }
        TemplateStatus::Rejected => {
            out.rejected_at = out.rejected_at.or(Some(stamp));
        }
        TemplateStatus::Draft => {}
    }
    out
}

/// Resolve the template identity: provider template id first, then the
/// newest row matching company + name (+ language when carried).
async fn resolve_template_id(
    conn: &mut MySqlConnection,
    integration_id: u64,
    company_id: u64,
    event: &TemplateEvent,
) -> StoreResult<Option<u64>> {
    if let Some(provider_id) = event.provider_template_id.as_deref() {
        let row = sqlx::query_as::<_, TemplateIdRow>(
            "SELECT id FROM whatsapp_template \
             WHERE integration_id = ? AND provider_template_id = ? \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(integration_id)
        .bind(provider_id)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(row) = row {
            return Ok(Some(row.id));
        }
    }
    let Some(name) = event.name.as_deref() else {
        return Ok(None);
    };
    let row = if let Some(language) = event.language.as_deref() {
        sqlx::query_as::<_, TemplateIdRow>(
            "SELECT id FROM whatsapp_template \
             WHERE company_id = ? AND name = ? AND language = ? \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(company_id)
        .bind(name)
        .bind(language)
        .fetch_optional(&mut *conn)
        .await?
    } else {
        sqlx::query_as::<_, TemplateIdRow>(
            "SELECT id FROM whatsapp_template \
             WHERE company_id = ? AND name = ? \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(company_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    };
    Ok(row.map(|r| r.id))
}

/// Apply a template lifecycle event inside the caller's transaction.
///
/// The template row always takes the new status; rejection metadata is
/// cleared unless the status is `REJECTED`. The latest version (highest
/// `version_no`) is selected under a row lock and has its
/// first-occurrence stamp filled for the status.
pub async fn apply_template_event(
    conn: &mut MySqlConnection,
    integration_id: u64,
    company_id: u64,
    event: &TemplateEvent,
    status: TemplateStatus,
    now: NaiveDateTime,
) -> StoreResult<TemplateApplyOutcome> {
    let Some(template_id) = resolve_template_id(conn, integration_id, company_id, event).await?
    else {
        return Ok(TemplateApplyOutcome::NotFound);
    };

    let rejected = status == TemplateStatus::Rejected;
    let rejection_reason = if rejected { event.rejection_reason.as_deref() } else { None };
    let correct_category = if rejected { event.correct_category.as_deref() } else { None };

    sqlx::query(
        "UPDATE whatsapp_template \
         SET status = ?, rejection_reason = ?, correct_category = ?, \
             last_synced_at = UTC_TIMESTAMP(), updated_at = UTC_TIMESTAMP() \
         WHERE id = ?",
    )
    .bind(status.as_db_str())
    .bind(rejection_reason)
    .bind(correct_category)
    .bind(template_id)
    .execute(&mut *conn)
    .await?;

    let version = sqlx::query_as::<_, TemplateVersionRow>(
        "SELECT id, submitted_at, approved_at, rejected_at \
         FROM whatsapp_template_version \
         WHERE template_id = ? \
         ORDER BY version_no DESC LIMIT 1 \
         FOR UPDATE",
    )
    .bind(template_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(version) = version {
        let stamp = event.event_at.map(|t| t.naive_utc()).unwrap_or(now);
        let stamps = version_stamps(&version, status, stamp);
        sqlx::query(
            "UPDATE whatsapp_template_version \
             SET status = ?, submitted_at = ?, approved_at = ?, rejected_at = ?, \
                 rejection_reason = ?, updated_at = UTC_TIMESTAMP() \
             WHERE id = ?",
        )
        .bind(status.as_db_str())
        .bind(stamps.submitted_at)
        .bind(stamps.approved_at)
        .bind(stamps.rejected_at)
        .bind(rejection_reason)
        .bind(version.id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(TemplateApplyOutcome::Updated)
}
