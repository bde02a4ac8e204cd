//! Repository for the append-only `workflow_runs` ledger.
//!
//! Rows are inserted once per successful scheduled firing (by the change-set
//! transaction) and never updated or deleted by the engine; this repository
//! only adds standalone insertion and the lookups the scheduled sweep and
//! audit views need.

use sqlx::PgPool;

use docuflow_core::types::{DbId, Timestamp};
use docuflow_core::workflow::TriggerType;

use crate::models::workflow_run::WorkflowRunRow;

/// Column list for workflow_runs queries.
const COLUMNS: &str = "id, workflow_id, document_id, trigger_type, run_at";

/// Provides append and lookup operations for the run ledger.
pub struct WorkflowRunRepo;

impl WorkflowRunRepo {
    /// Append a run record, returning the created row.
    pub async fn record(
        pool: &PgPool,
        workflow_id: DbId,
        document_id: DbId,
        trigger_type: TriggerType,
    ) -> Result<WorkflowRunRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflow_runs (workflow_id, document_id, trigger_type)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRunRow>(&query)
            .bind(workflow_id)
            .bind(document_id)
            .bind(trigger_type.as_str())
            .fetch_one(pool)
            .await
    }

    /// Timestamp of the newest run for (workflow, document), if any.
    pub async fn last_run_at(
        pool: &PgPool,
        workflow_id: DbId,
        document_id: DbId,
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT run_at FROM workflow_runs
             WHERE workflow_id = $1 AND document_id = $2
             ORDER BY run_at DESC LIMIT 1",
        )
        .bind(workflow_id)
        .bind(document_id)
        .fetch_optional(pool)
        .await
    }

    /// All runs recorded for a document, newest first.
    pub async fn list_for_document(
        pool: &PgPool,
        document_id: DbId,
    ) -> Result<Vec<WorkflowRunRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_runs WHERE document_id = $1 ORDER BY run_at DESC, id DESC"
        );
        sqlx::query_as::<_, WorkflowRunRow>(&query)
            .bind(document_id)
            .fetch_all(pool)
            .await
    }

    /// Number of runs recorded for (workflow, document).
    pub async fn count(
        pool: &PgPool,
        workflow_id: DbId,
        document_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM workflow_runs WHERE workflow_id = $1 AND document_id = $2",
        )
        .bind(workflow_id)
        .bind(document_id)
        .fetch_one(pool)
        .await
    }
}
