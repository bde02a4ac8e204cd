//! The workflow engine object and its dispatch entry points.
//!
//! [`WorkflowEngine`] is constructed explicitly with its database pool and
//! passed by reference to call sites (consumption pipeline, document-update
//! path, scheduled sweep) — there is no process-wide singleton. Delivery
//! channels are built once at construction; SMTP is optional and gated on
//! the environment.

use std::sync::Arc;

use chrono::Utc;

use docuflow_core::document::DocumentSnapshot;
use docuflow_core::matching::{ContentMatcher, PatternMatcher};
use docuflow_core::plan::build_change_set;
use docuflow_core::schedule;
use docuflow_core::trigger::{self, TriggerOutcome};
use docuflow_core::types::DbId;
use docuflow_core::workflow::{TriggerType, Workflow};
use docuflow_db::repositories::{DocumentRepo, WorkflowRepo, WorkflowRunRepo};
use docuflow_db::DbPool;

use crate::delivery::email::{EmailConfig, EmailDelivery};
use crate::delivery::webhook::WebhookDelivery;
use crate::error::EngineError;
use crate::executor::{self, AppliedResult};

/// Evaluates triggers and applies workflow actions to documents.
pub struct WorkflowEngine {
    pool: DbPool,
    matcher: Arc<dyn ContentMatcher>,
    email: Option<Arc<EmailDelivery>>,
    webhook: Arc<WebhookDelivery>,
}

impl WorkflowEngine {
    /// Construct an engine over the given pool.
    ///
    /// Email delivery is enabled only when SMTP is configured in the
    /// environment (see [`EmailConfig::from_env`]).
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            matcher: Arc::new(PatternMatcher),
            email: EmailConfig::from_env().map(|config| Arc::new(EmailDelivery::new(config))),
            webhook: Arc::new(WebhookDelivery::new()),
        }
    }

    /// Substitute the content-matching backend (used by tests and the
    /// entity-matching integration).
    pub fn with_matcher(mut self, matcher: Arc<dyn ContentMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn email_delivery(&self) -> Option<Arc<EmailDelivery>> {
        self.email.clone()
    }

    pub(crate) fn webhook_delivery(&self) -> Arc<WebhookDelivery> {
        self.webhook.clone()
    }

    // -- dispatch -----------------------------------------------------------

    /// Evaluate and fire all enabled workflows for one document and event.
    ///
    /// This is the single dispatch entry point used by the consumption
    /// pipeline, the document-update path, and (per document) the scheduled
    /// sweep. Matching workflows merge into one change-set, applied once.
    pub async fn run_workflows(
        &self,
        trigger_type: TriggerType,
        document_id: DbId,
    ) -> Result<AppliedResult, EngineError> {
        let snapshot = DocumentRepo::snapshot(&self.pool, document_id)
            .await?
            .ok_or(EngineError::DocumentNotFound(document_id))?;
        let workflows = WorkflowRepo::list_enabled_for_type(&self.pool, trigger_type).await?;
        self.fire_for_snapshot(&snapshot, &workflows, trigger_type)
            .await
    }

    /// Evaluate one workflow against one document without applying anything.
    ///
    /// Diagnostic entry point: checks the workflow's triggers of every type
    /// (ignoring enabled state, schedule due-ness, and the run ledger) and
    /// reports the match verdict with its reason.
    pub async fn evaluate_only(
        &self,
        document_id: DbId,
        workflow_id: DbId,
    ) -> Result<TriggerOutcome, EngineError> {
        let snapshot = DocumentRepo::snapshot(&self.pool, document_id)
            .await?
            .ok_or(EngineError::DocumentNotFound(document_id))?;
        let workflow = WorkflowRepo::get(&self.pool, workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;

        let mut reasons: Vec<String> = Vec::new();
        for trigger in &workflow.triggers {
            let outcome = trigger::trigger_matches(&snapshot, trigger, self.matcher.as_ref());
            if outcome.matched {
                return Ok(outcome);
            }
            reasons.push(outcome.reason);
        }
        Ok(TriggerOutcome::not_matched(if reasons.is_empty() {
            "Workflow has no triggers".to_string()
        } else {
            reasons.join("; ")
        }))
    }

    /// Evaluate the given workflows against an already-loaded snapshot and
    /// apply the merged change-set.
    ///
    /// For SCHEDULED firings this also applies the clock and run-ledger
    /// gating, and records one ledger row per fired workflow inside the
    /// apply transaction.
    pub(crate) async fn fire_for_snapshot(
        &self,
        snapshot: &DocumentSnapshot,
        workflows: &[Workflow],
        trigger_type: TriggerType,
    ) -> Result<AppliedResult, EngineError> {
        let now = Utc::now();
        let mut matched: Vec<&Workflow> = Vec::new();

        for workflow in workflows {
            let eligible = if trigger_type == TriggerType::Scheduled {
                self.scheduled_eligible(snapshot, workflow, now).await?
            } else {
                trigger::workflow_matches(snapshot, workflow, trigger_type, self.matcher.as_ref())
                    .matched
            };
            if eligible {
                tracing::info!(
                    document_id = snapshot.id,
                    workflow = %workflow.name,
                    trigger = %trigger_type,
                    "Workflow matched document"
                );
                matched.push(workflow);
            }
        }

        if matched.is_empty() {
            return Ok(AppliedResult::default());
        }

        let matched_ids: Vec<DbId> = matched.iter().map(|w| w.id).collect();
        let record_runs_for: Vec<DbId> = if trigger_type == TriggerType::Scheduled {
            matched_ids.clone()
        } else {
            Vec::new()
        };

        let change_set = build_change_set(snapshot, &matched);
        executor::apply_and_notify(
            self,
            snapshot,
            change_set,
            trigger_type,
            matched_ids,
            &record_runs_for,
        )
        .await
    }

    /// Whether any of the workflow's SCHEDULED triggers both matches the
    /// document's filters and is due per the clock and run ledger.
    async fn scheduled_eligible(
        &self,
        snapshot: &DocumentSnapshot,
        workflow: &Workflow,
        now: docuflow_core::types::Timestamp,
    ) -> Result<bool, EngineError> {
        let last_run = WorkflowRunRepo::last_run_at(&self.pool, workflow.id, snapshot.id).await?;

        for trigger in workflow.triggers_of_type(TriggerType::Scheduled) {
            let outcome = trigger::trigger_matches(snapshot, trigger, self.matcher.as_ref());
            if !outcome.matched {
                tracing::debug!(
                    document_id = snapshot.id,
                    workflow = %workflow.name,
                    reason = %outcome.reason,
                    "Scheduled trigger filters did not match"
                );
                continue;
            }
            let decision = schedule::decide(now, snapshot, trigger, last_run);
            if decision.should_fire() {
                return Ok(true);
            }
            tracing::debug!(
                document_id = snapshot.id,
                workflow = %workflow.name,
                trigger_id = trigger.id,
                decision = ?decision,
                "Scheduled trigger not eligible"
            );
        }
        Ok(false)
    }
}
