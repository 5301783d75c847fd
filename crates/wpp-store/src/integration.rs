// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration mapping lookup. Read-only: the mapping from producer app
//! ids to companies is owned by the wider system.

use crate::StoreResult;
use sqlx::mysql::MySqlConnection;

/// An active integration mapping.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IntegrationRow {
    /// Integration primary key.
    pub id: u64,
    /// Owning company.
    pub company_id: u64,
}

/// Look up the active integration for a producer app id. Inactive
/// mappings are treated as absent.
pub async fn find_active_by_app_id(
    conn: &mut MySqlConnection,
    app_id: &str,
) -> StoreResult<Option<IntegrationRow>> {
    let row = sqlx::query_as::<_, IntegrationRow>(
        "SELECT id, company_id FROM whatsapp_integration \
         WHERE app_id = ? AND is_active = 1 \
         LIMIT 1",
    )
    .bind(app_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}
