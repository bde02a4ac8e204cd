//! Workflow configuration models and DTOs.
//!
//! Rows store enum fields as wire-format text and id sets / action payloads
//! as `jsonb`; [`WorkflowTriggerRow::decode`] and [`WorkflowActionRow::decode`]
//! lift them into the `docuflow-core` sum types. A decode failure is a fatal
//! configuration error (schema/version skew), never silently ignored.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use docuflow_core::document::DocumentSource;
use docuflow_core::error::CoreError;
use docuflow_core::types::{DbId, Timestamp};
use docuflow_core::workflow::{
    ActionConfig, MatchingAlgorithm, ScheduleDateField, TriggerType, WorkflowAction,
    WorkflowTrigger,
};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A workflow row from the `workflows` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowRow {
    pub id: DbId,
    pub name: String,
    pub sort_order: i32,
    pub enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A trigger row from the `workflow_triggers` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowTriggerRow {
    pub id: DbId,
    pub trigger_type: String,
    pub sources: serde_json::Value,
    pub filter_filename: Option<String>,
    pub filter_path: Option<String>,
    pub filter_mailrule_id: Option<DbId>,
    pub filter_has_tags: serde_json::Value,
    pub filter_has_correspondent_id: Option<DbId>,
    pub filter_has_document_type_id: Option<DbId>,
    pub matching_algorithm: String,
    pub match_pattern: String,
    pub is_insensitive: bool,
    pub schedule_offset_days: i32,
    pub schedule_date_field: String,
    pub schedule_date_custom_field_id: Option<DbId>,
    pub schedule_is_recurring: bool,
    pub schedule_recurring_interval_days: i32,
    pub created_at: Timestamp,
}

/// An action row from the `workflow_actions` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowActionRow {
    pub id: DbId,
    pub action_type: String,
    pub config_json: serde_json::Value,
    pub created_at: Timestamp,
}

fn id_set(value: &serde_json::Value, column: &str) -> Result<HashSet<DbId>, CoreError> {
    serde_json::from_value(value.clone())
        .map_err(|e| CoreError::Config(format!("Invalid id list in {column}: {e}")))
}

impl WorkflowTriggerRow {
    /// Decode this row into the domain trigger type.
    pub fn decode(&self) -> Result<WorkflowTrigger, CoreError> {
        let source_names: Vec<String> = serde_json::from_value(self.sources.clone())
            .map_err(|e| CoreError::Config(format!("Invalid sources list: {e}")))?;
        let sources = source_names
            .iter()
            .map(|s| DocumentSource::from_str(s))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(WorkflowTrigger {
            id: self.id,
            trigger_type: TriggerType::from_str(&self.trigger_type)?,
            sources,
            filter_filename: self.filter_filename.clone(),
            filter_path: self.filter_path.clone(),
            filter_mailrule_id: self.filter_mailrule_id,
            filter_has_tags: id_set(&self.filter_has_tags, "filter_has_tags")?,
            filter_has_correspondent: self.filter_has_correspondent_id,
            filter_has_document_type: self.filter_has_document_type_id,
            matching_algorithm: MatchingAlgorithm::from_str(&self.matching_algorithm)?,
            match_pattern: self.match_pattern.clone(),
            is_insensitive: self.is_insensitive,
            schedule_offset_days: self.schedule_offset_days,
            schedule_date_field: ScheduleDateField::from_str(&self.schedule_date_field)?,
            schedule_date_custom_field: self.schedule_date_custom_field_id,
            schedule_is_recurring: self.schedule_is_recurring,
            schedule_recurring_interval_days: self.schedule_recurring_interval_days,
        })
    }
}

impl WorkflowActionRow {
    /// Decode this row into the domain action type.
    pub fn decode(&self) -> Result<WorkflowAction, CoreError> {
        Ok(WorkflowAction {
            id: self.id,
            config: ActionConfig::decode(&self.action_type, &self.config_json)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Create DTOs
// ---------------------------------------------------------------------------

/// Input for creating a new workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkflow {
    pub name: String,
    pub sort_order: Option<i32>,
    pub enabled: Option<bool>,
}

/// Input for creating a new trigger definition.
///
/// Typed fields are encoded into wire-format columns by the repository.
#[derive(Debug, Clone)]
pub struct CreateTrigger {
    pub trigger_type: TriggerType,
    pub sources: Vec<DocumentSource>,
    pub filter_filename: Option<String>,
    pub filter_path: Option<String>,
    pub filter_mailrule_id: Option<DbId>,
    pub filter_has_tags: Vec<DbId>,
    pub filter_has_correspondent_id: Option<DbId>,
    pub filter_has_document_type_id: Option<DbId>,
    pub matching_algorithm: MatchingAlgorithm,
    pub match_pattern: String,
    pub is_insensitive: bool,
    pub schedule_offset_days: i32,
    pub schedule_date_field: ScheduleDateField,
    pub schedule_date_custom_field_id: Option<DbId>,
    pub schedule_is_recurring: bool,
    pub schedule_recurring_interval_days: i32,
}

impl CreateTrigger {
    /// A trigger of the given type with every filter left unset.
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            sources: Vec::new(),
            filter_filename: None,
            filter_path: None,
            filter_mailrule_id: None,
            filter_has_tags: Vec::new(),
            filter_has_correspondent_id: None,
            filter_has_document_type_id: None,
            matching_algorithm: MatchingAlgorithm::None,
            match_pattern: String::new(),
            is_insensitive: true,
            schedule_offset_days: 0,
            schedule_date_field: ScheduleDateField::Created,
            schedule_date_custom_field_id: None,
            schedule_is_recurring: false,
            schedule_recurring_interval_days: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

/// Input for updating an existing workflow. All fields are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateWorkflow {
    pub name: Option<String>,
    pub sort_order: Option<i32>,
    pub enabled: Option<bool>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
