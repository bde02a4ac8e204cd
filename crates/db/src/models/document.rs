//! Document models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use docuflow_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A document row from the `documents` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocumentRow {
    pub id: DbId,
    pub title: String,
    pub original_filename: Option<String>,
    pub source_path: Option<String>,
    pub source: Option<String>,
    pub mailrule_id: Option<DbId>,
    pub content: String,
    pub correspondent_id: Option<DbId>,
    pub document_type_id: Option<DbId>,
    pub storage_path_id: Option<DbId>,
    pub owner_id: Option<DbId>,
    pub created: Timestamp,
    pub added: Timestamp,
    pub modified: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a new document record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDocument {
    pub title: String,
    pub original_filename: Option<String>,
    pub source_path: Option<String>,
    pub source: Option<String>,
    pub mailrule_id: Option<DbId>,
    pub content: String,
    pub correspondent_id: Option<DbId>,
    pub document_type_id: Option<DbId>,
    pub storage_path_id: Option<DbId>,
    pub owner_id: Option<DbId>,
    /// Defaults to now when unset.
    pub created: Option<Timestamp>,
}

/// A custom-field instance row from `custom_field_instances`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CustomFieldInstanceRow {
    pub id: DbId,
    pub document_id: DbId,
    pub field_id: DbId,
    pub value: Option<String>,
    pub created_at: Timestamp,
}
