// SPDX-License-Identifier: MIT OR Apache-2.0
//! # wpp-store
//!
//! Database access for the webhook pipeline: the append-only raw event
//! buffer (the only table this system owns) and the projection
//! repositories over the pre-existing operational tables.
//!
//! Every projection function takes an open connection so the worker can
//! scope a whole batch to one transaction; only the ingest-side insert
//! runs against the pool directly.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod consent;
pub mod integration;
pub mod raw;
pub mod recipient;
pub mod template;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use wpp_config::DbSettings;

/// Errors surfaced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    /// A configured identifier failed the whitelist re-check.
    #[error("invalid column identifier: {0}")]
    InvalidColumn(String),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Build the shared connection pool from resolved settings.
pub async fn connect_pool(db: &DbSettings, pool_size: u32) -> StoreResult<MySqlPool> {
    let options = MySqlConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .username(&db.user)
        .password(&db.password)
        .database(&db.database);
    let pool = MySqlPoolOptions::new()
        .max_connections(pool_size)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create the raw buffer table if it does not exist. All other tables are
/// external contracts owned by the wider system.
pub async fn ensure_schema(pool: &MySqlPool) -> StoreResult<()> {
    sqlx::query(include_str!("../schema.sql")).execute(pool).await?;
    Ok(())
}
