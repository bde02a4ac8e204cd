//! Repositories for the lookup entities documents reference.
//!
//! These are deliberately minimal — the engine only resolves ids and names;
//! richer management lives in the platform's API layer.

use sqlx::PgPool;

use docuflow_core::types::DbId;

/// Create-or-fetch a row in a simple `(id, name)` lookup table.
async fn upsert_named(pool: &PgPool, table: &str, name: &str) -> Result<DbId, sqlx::Error> {
    let query = format!(
        "INSERT INTO {table} (name) VALUES ($1)
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
         RETURNING id"
    );
    sqlx::query_scalar(&query).bind(name).fetch_one(pool).await
}

/// Tags documents can carry.
pub struct TagRepo;

impl TagRepo {
    pub async fn create(pool: &PgPool, name: &str) -> Result<DbId, sqlx::Error> {
        upsert_named(pool, "tags", name).await
    }
}

/// Correspondents (senders/receivers) documents are filed under.
pub struct CorrespondentRepo;

impl CorrespondentRepo {
    pub async fn create(pool: &PgPool, name: &str) -> Result<DbId, sqlx::Error> {
        upsert_named(pool, "correspondents", name).await
    }
}

/// Document type classifications.
pub struct DocumentTypeRepo;

impl DocumentTypeRepo {
    pub async fn create(pool: &PgPool, name: &str) -> Result<DbId, sqlx::Error> {
        upsert_named(pool, "document_types", name).await
    }
}

/// Storage path assignments.
pub struct StoragePathRepo;

impl StoragePathRepo {
    pub async fn create(pool: &PgPool, name: &str, path: &str) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO storage_paths (name, path) VALUES ($1, $2)
             ON CONFLICT (name) DO UPDATE SET path = EXCLUDED.path
             RETURNING id",
        )
        .bind(name)
        .bind(path)
        .fetch_one(pool)
        .await
    }
}

/// Platform users (document owners and ACL members).
pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, username: &str) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO users (username) VALUES ($1)
             ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
             RETURNING id",
        )
        .bind(username)
        .fetch_one(pool)
        .await
    }
}

/// User groups for ACL assignment.
pub struct GroupRepo;

impl GroupRepo {
    pub async fn create(pool: &PgPool, name: &str) -> Result<DbId, sqlx::Error> {
        upsert_named(pool, "user_groups", name).await
    }
}

/// Custom field definitions.
pub struct CustomFieldRepo;

impl CustomFieldRepo {
    pub async fn create(pool: &PgPool, name: &str, data_type: &str) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO custom_fields (name, data_type) VALUES ($1, $2)
             ON CONFLICT (name) DO UPDATE SET data_type = EXCLUDED.data_type
             RETURNING id",
        )
        .bind(name)
        .bind(data_type)
        .fetch_one(pool)
        .await
    }
}
