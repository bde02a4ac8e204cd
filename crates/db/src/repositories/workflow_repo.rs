//! Repository for workflows, their triggers, and their actions.
//!
//! Triggers and actions are shared entities attached to workflows through
//! link tables; definition order within a workflow is member id order.
//! Loading decodes rows into the `docuflow-core` domain types, so a stored
//! row that no longer decodes surfaces as a fatal configuration error.

use sqlx::PgPool;

use docuflow_core::types::DbId;
use docuflow_core::workflow::{ActionConfig, TriggerType, Workflow};

use crate::models::workflow::{
    CreateTrigger, CreateWorkflow, UpdateWorkflow, WorkflowActionRow, WorkflowRow,
    WorkflowTriggerRow,
};
use crate::DbError;

/// Column list for workflows queries.
const COLUMNS: &str = "id, name, sort_order, enabled, created_at, updated_at";

/// Column list for workflow_triggers queries.
const TRIGGER_COLUMNS: &str = "id, trigger_type, sources, filter_filename, filter_path, \
    filter_mailrule_id, filter_has_tags, filter_has_correspondent_id, \
    filter_has_document_type_id, matching_algorithm, match_pattern, is_insensitive, \
    schedule_offset_days, schedule_date_field, schedule_date_custom_field_id, \
    schedule_is_recurring, schedule_recurring_interval_days, created_at";

/// Column list for workflow_actions queries.
const ACTION_COLUMNS: &str = "id, action_type, config_json, created_at";

/// Provides CRUD and decoded loading for workflow configuration.
pub struct WorkflowRepo;

impl WorkflowRepo {
    // -- workflows ----------------------------------------------------------

    /// Insert a new workflow, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateWorkflow) -> Result<WorkflowRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflows (name, sort_order, enabled)
             VALUES ($1, COALESCE($2, 0), COALESCE($3, true))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(&input.name)
            .bind(input.sort_order)
            .bind(input.enabled)
            .fetch_one(pool)
            .await
    }

    /// Update an existing workflow. Returns the updated row, or `None` if
    /// not found.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateWorkflow,
    ) -> Result<Option<WorkflowRow>, sqlx::Error> {
        let query = format!(
            "UPDATE workflows SET
                name       = COALESCE($1, name),
                sort_order = COALESCE($2, sort_order),
                enabled    = COALESCE($3, enabled),
                updated_at = now()
             WHERE id = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(&input.name)
            .bind(input.sort_order)
            .bind(input.enabled)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a workflow by its ID. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Toggle a workflow's enabled status. Returns `true` if a row was
    /// updated.
    pub async fn set_enabled(pool: &PgPool, id: DbId, enabled: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE workflows SET enabled = $1, updated_at = now() WHERE id = $2")
            .bind(enabled)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -- triggers / actions -------------------------------------------------

    /// Insert a new trigger definition, returning the created row.
    pub async fn create_trigger(
        pool: &PgPool,
        input: &CreateTrigger,
    ) -> Result<WorkflowTriggerRow, sqlx::Error> {
        let sources: Vec<&str> = input.sources.iter().map(|s| s.as_str()).collect();
        let query = format!(
            "INSERT INTO workflow_triggers
                (trigger_type, sources, filter_filename, filter_path, filter_mailrule_id,
                 filter_has_tags, filter_has_correspondent_id, filter_has_document_type_id,
                 matching_algorithm, match_pattern, is_insensitive,
                 schedule_offset_days, schedule_date_field, schedule_date_custom_field_id,
                 schedule_is_recurring, schedule_recurring_interval_days)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING {TRIGGER_COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowTriggerRow>(&query)
            .bind(input.trigger_type.as_str())
            .bind(serde_json::json!(sources))
            .bind(&input.filter_filename)
            .bind(&input.filter_path)
            .bind(input.filter_mailrule_id)
            .bind(serde_json::json!(input.filter_has_tags))
            .bind(input.filter_has_correspondent_id)
            .bind(input.filter_has_document_type_id)
            .bind(input.matching_algorithm.as_str())
            .bind(&input.match_pattern)
            .bind(input.is_insensitive)
            .bind(input.schedule_offset_days)
            .bind(input.schedule_date_field.as_str())
            .bind(input.schedule_date_custom_field_id)
            .bind(input.schedule_is_recurring)
            .bind(input.schedule_recurring_interval_days)
            .fetch_one(pool)
            .await
    }

    /// Insert a new action definition, returning the created row.
    pub async fn create_action(
        pool: &PgPool,
        config: &ActionConfig,
    ) -> Result<WorkflowActionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflow_actions (action_type, config_json)
             VALUES ($1, $2)
             RETURNING {ACTION_COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowActionRow>(&query)
            .bind(config.action_type())
            .bind(config.to_config_json())
            .fetch_one(pool)
            .await
    }

    /// Attach a trigger to a workflow.
    pub async fn attach_trigger(
        pool: &PgPool,
        workflow_id: DbId,
        trigger_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workflow_trigger_links (workflow_id, trigger_id)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(workflow_id)
        .bind(trigger_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Attach an action to a workflow.
    pub async fn attach_action(
        pool: &PgPool,
        workflow_id: DbId,
        action_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workflow_action_links (workflow_id, action_id)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(workflow_id)
        .bind(action_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    // -- decoded loading ----------------------------------------------------

    /// Load all enabled workflows with their triggers and actions decoded,
    /// in ascending `sort_order` (ties broken by id).
    pub async fn list_enabled(pool: &PgPool) -> Result<Vec<Workflow>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflows WHERE enabled = TRUE ORDER BY sort_order, id"
        );
        let rows = sqlx::query_as::<_, WorkflowRow>(&query).fetch_all(pool).await?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            workflows.push(Self::assemble(pool, row).await?);
        }
        Ok(workflows)
    }

    /// Load all enabled workflows that carry at least one trigger of the
    /// given type.
    pub async fn list_enabled_for_type(
        pool: &PgPool,
        trigger_type: TriggerType,
    ) -> Result<Vec<Workflow>, DbError> {
        let workflows = Self::list_enabled(pool).await?;
        Ok(workflows
            .into_iter()
            .filter(|w| w.has_trigger_of_type(trigger_type))
            .collect())
    }

    /// Load one workflow (enabled or not) with its triggers and actions
    /// decoded.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<Option<Workflow>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM workflows WHERE id = $1");
        let row = sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        match row {
            Some(row) => Ok(Some(Self::assemble(pool, row).await?)),
            None => Ok(None),
        }
    }

    /// Fetch and decode a workflow's triggers and actions.
    async fn assemble(pool: &PgPool, row: WorkflowRow) -> Result<Workflow, DbError> {
        let trigger_rows = sqlx::query_as::<_, WorkflowTriggerRow>(
            "SELECT t.* FROM workflow_triggers t
             JOIN workflow_trigger_links l ON l.trigger_id = t.id
             WHERE l.workflow_id = $1
             ORDER BY t.id",
        )
        .bind(row.id)
        .fetch_all(pool)
        .await?;

        let action_rows = sqlx::query_as::<_, WorkflowActionRow>(
            "SELECT a.* FROM workflow_actions a
             JOIN workflow_action_links l ON l.action_id = a.id
             WHERE l.workflow_id = $1
             ORDER BY a.id",
        )
        .bind(row.id)
        .fetch_all(pool)
        .await?;

        let triggers = trigger_rows
            .iter()
            .map(WorkflowTriggerRow::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let actions = action_rows
            .iter()
            .map(WorkflowActionRow::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Workflow {
            id: row.id,
            name: row.name,
            order: row.sort_order,
            enabled: row.enabled,
            triggers,
            actions,
        })
    }
}
