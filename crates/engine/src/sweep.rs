//! Periodic scheduled-trigger sweep.
//!
//! [`sweep_once`] walks every document against every enabled workflow with
//! SCHEDULED triggers, firing the due ones through the normal plan/apply
//! path. Per-document evaluation is read-mostly and runs with bounded
//! concurrency; the executor's row lock serializes each document's apply
//! against concurrent event-triggered dispatch. The sweep runs to
//! completion per tick, and per-document failures are logged without
//! aborting the rest of the batch.
//!
//! [`run`] is the long-lived background job driving `sweep_once` on a fixed
//! interval; the exact cadence belongs to the deployment environment.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use docuflow_core::types::DbId;
use docuflow_core::workflow::{TriggerType, Workflow};
use docuflow_db::repositories::{DocumentRepo, WorkflowRepo};

use crate::engine::WorkflowEngine;
use crate::error::EngineError;

/// Default sweep interval when `WORKFLOW_SWEEP_INTERVAL_SECS` is not set.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// Concurrent per-document evaluations per sweep.
const SWEEP_CONCURRENCY: usize = 8;

// ---------------------------------------------------------------------------
// SweepStats
// ---------------------------------------------------------------------------

/// Summary of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepStats {
    /// Enabled workflows carrying at least one SCHEDULED trigger.
    pub workflows: usize,
    /// Documents evaluated.
    pub documents: usize,
    /// Documents for which at least one workflow fired.
    pub fired: usize,
    /// Documents whose evaluation or apply failed.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Run one full sweep over all documents. Synchronous run-to-completion;
/// returns aggregate counts.
pub async fn sweep_once(engine: &WorkflowEngine) -> Result<SweepStats, EngineError> {
    let workflows =
        WorkflowRepo::list_enabled_for_type(engine.pool(), TriggerType::Scheduled).await?;
    if workflows.is_empty() {
        return Ok(SweepStats::default());
    }

    let document_ids = DocumentRepo::list_ids(engine.pool()).await?;
    let mut stats = SweepStats {
        workflows: workflows.len(),
        documents: document_ids.len(),
        ..Default::default()
    };

    let outcomes: Vec<(DbId, Result<bool, EngineError>)> = stream::iter(document_ids)
        .map(|id| {
            let workflows = &workflows;
            async move { (id, process_document(engine, workflows, id).await) }
        })
        .buffer_unordered(SWEEP_CONCURRENCY)
        .collect()
        .await;

    for (document_id, outcome) in outcomes {
        match outcome {
            Ok(true) => stats.fired += 1,
            Ok(false) => {}
            Err(e) => {
                stats.failed += 1;
                tracing::error!(document_id, error = %e, "Scheduled sweep failed for document");
            }
        }
    }

    tracing::debug!(
        workflows = stats.workflows,
        documents = stats.documents,
        fired = stats.fired,
        failed = stats.failed,
        "Scheduled sweep pass complete"
    );
    Ok(stats)
}

/// Evaluate one document against the scheduled workflows; returns whether
/// anything fired.
async fn process_document(
    engine: &WorkflowEngine,
    workflows: &[Workflow],
    document_id: DbId,
) -> Result<bool, EngineError> {
    let Some(snapshot) = DocumentRepo::snapshot(engine.pool(), document_id).await? else {
        // Deleted between listing and evaluation.
        return Ok(false);
    };
    let result = engine
        .fire_for_snapshot(&snapshot, workflows, TriggerType::Scheduled)
        .await?;
    Ok(!result.matched_workflows.is_empty())
}

// ---------------------------------------------------------------------------
// Background job
// ---------------------------------------------------------------------------

/// Run the sweep loop until `cancel` is triggered.
///
/// The interval is read from `WORKFLOW_SWEEP_INTERVAL_SECS` (default 600).
pub async fn run(engine: Arc<WorkflowEngine>, cancel: CancellationToken) {
    let interval_secs: u64 = std::env::var("WORKFLOW_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

    tracing::info!(interval_secs, "Scheduled workflow sweep started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Scheduled workflow sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(&engine).await {
                    Ok(stats) if stats.fired > 0 => {
                        tracing::info!(
                            fired = stats.fired,
                            documents = stats.documents,
                            "Scheduled workflows fired"
                        );
                    }
                    Ok(_) => {
                        tracing::debug!("Scheduled sweep: nothing due");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Scheduled sweep failed");
                    }
                }
            }
        }
    }
}
