//! Workflow run ledger model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use docuflow_core::types::{DbId, Timestamp};

/// A row from the append-only `workflow_runs` ledger.
///
/// Existence of a row suppresses re-firing of non-recurring scheduled
/// triggers; the newest row gates recurring ones. Rows are never mutated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowRunRow {
    pub id: DbId,
    pub workflow_id: DbId,
    pub document_id: DbId,
    pub trigger_type: String,
    pub run_at: Timestamp,
}
