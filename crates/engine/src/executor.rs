//! Action executor: transactional apply plus fire-and-forget notifications.
//!
//! Metadata/permission changes commit in one transaction (via
//! `DocumentRepo::apply_change_set`); EMAIL/WEBHOOK actions are then
//! dispatched as independent spawned tasks. Once a notification is queued
//! it runs to completion or retry exhaustion — nothing blocks the triggering
//! event on delivery, and delivery failures never touch committed metadata.

use docuflow_core::document::DocumentSnapshot;
use docuflow_core::plan::{ChangeSet, NotificationAction};
use docuflow_core::types::DbId;
use docuflow_core::workflow::TriggerType;
use docuflow_db::repositories::DocumentRepo;

use crate::delivery::Attachment;
use crate::engine::WorkflowEngine;
use crate::error::EngineError;
use crate::notify;

// ---------------------------------------------------------------------------
// AppliedResult
// ---------------------------------------------------------------------------

/// What a firing event actually did.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AppliedResult {
    /// Workflows that matched, in merge order.
    pub matched_workflows: Vec<DbId>,
    /// Whether the document's metadata/permissions were written.
    pub applied: bool,
    /// Notification tasks queued after commit.
    pub notifications_queued: usize,
    /// Non-fatal template errors (title render, notification render).
    pub template_errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Apply + dispatch
// ---------------------------------------------------------------------------

/// Apply a planned change-set and dispatch its notification actions.
pub(crate) async fn apply_and_notify(
    engine: &WorkflowEngine,
    snapshot: &DocumentSnapshot,
    change_set: ChangeSet,
    trigger_type: TriggerType,
    matched_workflows: Vec<DbId>,
    record_runs_for: &[DbId],
) -> Result<AppliedResult, EngineError> {
    let applied = change_set.has_document_changes(snapshot);

    DocumentRepo::apply_change_set(
        engine.pool(),
        snapshot,
        &change_set,
        trigger_type,
        record_runs_for,
    )
    .await?;

    if applied {
        tracing::info!(
            document_id = snapshot.id,
            workflows = ?matched_workflows,
            trigger = %trigger_type,
            "Applied workflow change-set"
        );
    }

    let mut result = AppliedResult {
        matched_workflows,
        applied,
        notifications_queued: 0,
        template_errors: change_set.errors.clone(),
    };

    dispatch_notifications(engine, snapshot, &change_set, &mut result).await;

    Ok(result)
}

/// Queue notification actions as independent tasks.
///
/// Render failures are recoverable: logged, recorded, and skipped without
/// affecting sibling actions.
async fn dispatch_notifications(
    engine: &WorkflowEngine,
    snapshot: &DocumentSnapshot,
    change_set: &ChangeSet,
    result: &mut AppliedResult,
) {
    let needs_attachment = change_set.notifications.iter().any(|n| match n {
        NotificationAction::Email(c) => c.include_document,
        NotificationAction::Webhook(c) => c.include_document,
    });
    let attachment = if needs_attachment {
        load_attachment(snapshot).await
    } else {
        None
    };

    for notification in &change_set.notifications {
        match notification {
            NotificationAction::Email(config) => {
                let Some(delivery) = engine.email_delivery() else {
                    tracing::warn!(
                        document_id = snapshot.id,
                        "SMTP is not configured; skipping email action"
                    );
                    continue;
                };
                let wanted = config.include_document.then(|| attachment.clone()).flatten();
                match notify::render_email(config, snapshot, wanted) {
                    Ok(message) => {
                        result.notifications_queued += 1;
                        tokio::spawn(async move {
                            if let Err(e) = delivery.deliver(&message).await {
                                tracing::error!(error = %e, "Email notification failed");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(
                            document_id = snapshot.id,
                            error = %e,
                            "Skipping email action"
                        );
                        result.template_errors.push(e.to_string());
                    }
                }
            }
            NotificationAction::Webhook(config) => {
                let wanted = config.include_document.then(|| attachment.clone()).flatten();
                match notify::render_webhook(config, snapshot, wanted) {
                    Ok(request) => {
                        let delivery = engine.webhook_delivery();
                        result.notifications_queued += 1;
                        tokio::spawn(async move {
                            if let Err(e) = delivery.deliver(&request).await {
                                tracing::error!(error = %e, "Webhook notification failed");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(
                            document_id = snapshot.id,
                            error = %e,
                            "Skipping webhook action"
                        );
                        result.template_errors.push(e.to_string());
                    }
                }
            }
        }
    }
}

/// Read the document's file bytes for `include_document` notifications.
///
/// A missing or unreadable file downgrades to no attachment.
async fn load_attachment(snapshot: &DocumentSnapshot) -> Option<Attachment> {
    let path = snapshot.source_path.as_deref()?;
    match tokio::fs::read(path).await {
        Ok(content) => Some(Attachment {
            filename: snapshot
                .original_filename
                .clone()
                .unwrap_or_else(|| format!("document-{}", snapshot.id)),
            content,
        }),
        Err(e) => {
            tracing::warn!(
                document_id = snapshot.id,
                path,
                error = %e,
                "Could not read document file for attachment"
            );
            None
        }
    }
}
