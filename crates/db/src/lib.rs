//! Docuflow persistence layer.
//!
//! sqlx/PostgreSQL models and stateless repositories for the document
//! store, the workflow configuration tables, and the workflow-run ledger.
//! Migrations live in the repository-root `migrations/` directory.

pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

/// Shared connection pool handle.
pub type DbPool = sqlx::PgPool;

/// Default maximum pool size.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Errors from repositories that decode stored rows into domain types.
///
/// Plain CRUD repositories return `sqlx::Error` directly; this wrapper only
/// appears where a row can fail to decode (fatal configuration skew).
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Decode(#[from] docuflow_core::CoreError),
}

/// Connect to PostgreSQL with the default pool configuration.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Verify the database connection is usable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
