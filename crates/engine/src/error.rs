//! Engine error type.

use docuflow_core::error::CoreError;
use docuflow_core::types::DbId;
use docuflow_db::DbError;

/// Errors surfaced by the workflow engine.
///
/// `Database` aborts the whole change-set application for the event
/// (all-or-nothing) and propagates to the caller. `Config` is fatal
/// configuration skew from decoding stored workflow rows. Template and
/// notification failures never appear here — they are logged per action and
/// reported through `AppliedResult`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("document {0} not found")]
    DocumentNotFound(DbId),

    #[error("workflow {0} not found")]
    WorkflowNotFound(DbId),
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(e) => Self::Database(e),
            DbError::Decode(e) => Self::Config(e),
        }
    }
}
