//! Workflow configuration domain model.
//!
//! Workflows, their triggers, and their actions are administrator-managed
//! configuration; the engine only reads them. Rows are stored with a type
//! tag plus a `jsonb` payload and decoded here into sum types so that each
//! action kind carries only its own fields. Decoding failures are fatal
//! configuration errors — they indicate schema/version skew, never a
//! condition to paper over at evaluation time.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::document::DocumentSource;
use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// TriggerType
// ---------------------------------------------------------------------------

/// The lifecycle event a trigger reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Consumption,
    DocumentAdded,
    DocumentUpdated,
    Scheduled,
}

impl TriggerType {
    /// Return the wire-format string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumption => "consumption",
            Self::DocumentAdded => "document_added",
            Self::DocumentUpdated => "document_updated",
            Self::Scheduled => "scheduled",
        }
    }

    /// Parse from a wire-format string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "consumption" => Ok(Self::Consumption),
            "document_added" => Ok(Self::DocumentAdded),
            "document_updated" => Ok(Self::DocumentUpdated),
            "scheduled" => Ok(Self::Scheduled),
            _ => Err(CoreError::Config(format!(
                "Unknown trigger_type: '{s}'. Must be one of: consumption, document_added, \
                 document_updated, scheduled"
            ))),
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MatchingAlgorithm
// ---------------------------------------------------------------------------

/// Content-matching algorithm applied to the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingAlgorithm {
    /// No content matching configured; vacuously true.
    None,
    /// At least one word of the pattern occurs in the content.
    Any,
    /// Every word of the pattern occurs in the content.
    All,
    /// The pattern occurs verbatim as a substring.
    Literal,
    /// The pattern is a regular expression matched against the content.
    Regex,
    /// The pattern approximately occurs in the content.
    Fuzzy,
}

impl MatchingAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Any => "any",
            Self::All => "all",
            Self::Literal => "literal",
            Self::Regex => "regex",
            Self::Fuzzy => "fuzzy",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "none" => Ok(Self::None),
            "any" => Ok(Self::Any),
            "all" => Ok(Self::All),
            "literal" => Ok(Self::Literal),
            "regex" => Ok(Self::Regex),
            "fuzzy" => Ok(Self::Fuzzy),
            _ => Err(CoreError::Config(format!(
                "Unknown matching_algorithm: '{s}'. Must be one of: none, any, all, literal, \
                 regex, fuzzy"
            ))),
        }
    }
}

impl std::fmt::Display for MatchingAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ScheduleDateField
// ---------------------------------------------------------------------------

/// Which document date a scheduled trigger is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleDateField {
    Created,
    Added,
    Modified,
    CustomField,
}

impl ScheduleDateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Added => "added",
            Self::Modified => "modified",
            Self::CustomField => "custom_field",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "created" => Ok(Self::Created),
            "added" => Ok(Self::Added),
            "modified" => Ok(Self::Modified),
            "custom_field" => Ok(Self::CustomField),
            _ => Err(CoreError::Config(format!(
                "Unknown schedule_date_field: '{s}'. Must be one of: created, added, modified, \
                 custom_field"
            ))),
        }
    }
}

impl std::fmt::Display for ScheduleDateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkflowTrigger
// ---------------------------------------------------------------------------

/// A decoded trigger definition.
///
/// Every filter is optional; an unset filter is vacuously true, so a trigger
/// with no filters matches every document of its event type.
#[derive(Debug, Clone)]
pub struct WorkflowTrigger {
    pub id: DbId,
    pub trigger_type: TriggerType,

    /// Ingestion origins this trigger accepts (CONSUMPTION only; empty =
    /// any source).
    pub sources: HashSet<DocumentSource>,
    pub filter_filename: Option<String>,
    pub filter_path: Option<String>,
    pub filter_mailrule_id: Option<DbId>,
    /// Document tags must be a superset of this set.
    pub filter_has_tags: HashSet<DbId>,
    pub filter_has_correspondent: Option<DbId>,
    pub filter_has_document_type: Option<DbId>,

    pub matching_algorithm: MatchingAlgorithm,
    pub match_pattern: String,
    pub is_insensitive: bool,

    /// Days relative to the reference date; negative fires before it.
    pub schedule_offset_days: i32,
    pub schedule_date_field: ScheduleDateField,
    /// Required iff `schedule_date_field` is `CustomField`.
    pub schedule_date_custom_field: Option<DbId>,
    pub schedule_is_recurring: bool,
    pub schedule_recurring_interval_days: i32,
}

impl WorkflowTrigger {
    /// A wildcard trigger of the given type with no filters configured.
    pub fn wildcard(id: DbId, trigger_type: TriggerType) -> Self {
        Self {
            id,
            trigger_type,
            sources: HashSet::new(),
            filter_filename: None,
            filter_path: None,
            filter_mailrule_id: None,
            filter_has_tags: HashSet::new(),
            filter_has_correspondent: None,
            filter_has_document_type: None,
            matching_algorithm: MatchingAlgorithm::None,
            match_pattern: String::new(),
            is_insensitive: true,
            schedule_offset_days: 0,
            schedule_date_field: ScheduleDateField::Created,
            schedule_date_custom_field: None,
            schedule_is_recurring: false,
            schedule_recurring_interval_days: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Action payloads
// ---------------------------------------------------------------------------

/// Metadata and permission assignments applied when a workflow fires.
///
/// Scalar fields overwrite (last matching workflow wins); collection fields
/// union into the pending change-set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Title template with `{placeholder}` substitution.
    pub title: Option<String>,
    pub correspondent: Option<DbId>,
    pub document_type: Option<DbId>,
    pub storage_path: Option<DbId>,
    pub owner: Option<DbId>,

    pub tags: Vec<DbId>,
    pub view_users: Vec<DbId>,
    pub change_users: Vec<DbId>,
    pub view_groups: Vec<DbId>,
    pub change_groups: Vec<DbId>,

    pub custom_fields: Vec<DbId>,
    /// Literal values staged for custom fields being attached. Fields
    /// already present on the document keep their existing value.
    pub custom_field_values: HashMap<DbId, String>,
}

/// Metadata and permission removals applied when a workflow fires.
///
/// Removals only clear or subtract; they never resurrect a value. Each
/// category's `remove_all_*` flag clears the whole category, ignoring the
/// explicit id set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    pub remove_all_tags: bool,
    pub tags: Vec<DbId>,

    pub remove_all_correspondents: bool,
    pub correspondents: Vec<DbId>,

    pub remove_all_document_types: bool,
    pub document_types: Vec<DbId>,

    pub remove_all_storage_paths: bool,
    pub storage_paths: Vec<DbId>,

    pub remove_all_owners: bool,
    pub owners: Vec<DbId>,

    /// Clears all four ACL sets at once.
    pub remove_all_permissions: bool,
    pub view_users: Vec<DbId>,
    pub change_users: Vec<DbId>,
    pub view_groups: Vec<DbId>,
    pub change_groups: Vec<DbId>,

    pub remove_all_custom_fields: bool,
    pub custom_fields: Vec<DbId>,
}

/// Email notification sent after a workflow's metadata changes commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailActionConfig {
    /// Comma-separated recipient addresses.
    pub to: String,
    /// Subject template with `{placeholder}` substitution.
    pub subject: String,
    /// Body template with `{placeholder}` substitution.
    pub body: String,
    pub include_document: bool,
}

/// Webhook notification sent after a workflow's metadata changes commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookActionConfig {
    /// URL template with `{placeholder}` substitution.
    pub url: String,
    /// When true, send `params` as form data; otherwise send `body` raw.
    pub use_params: bool,
    /// JSON object text mapping form keys to value templates.
    pub params: Option<String>,
    /// Body template, used when `use_params` is false.
    pub body: Option<String>,
    /// JSON object text of literal request headers.
    pub headers: Option<String>,
    pub include_document: bool,
}

impl Default for WebhookActionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            use_params: true,
            params: None,
            body: None,
            headers: None,
            include_document: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ActionConfig
// ---------------------------------------------------------------------------

/// A decoded workflow action: one variant per action kind, each carrying
/// only its own payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionConfig {
    Assignment(AssignmentConfig),
    Removal(RemovalConfig),
    Email(EmailActionConfig),
    Webhook(WebhookActionConfig),
}

impl ActionConfig {
    /// Decode a stored `(action_type, config_json)` pair.
    pub fn decode(action_type: &str, config: &serde_json::Value) -> Result<Self, CoreError> {
        let invalid = |e: serde_json::Error| {
            CoreError::Config(format!("Invalid {action_type} action payload: {e}"))
        };
        match action_type {
            "assignment" => Ok(Self::Assignment(
                serde_json::from_value(config.clone()).map_err(invalid)?,
            )),
            "removal" => Ok(Self::Removal(
                serde_json::from_value(config.clone()).map_err(invalid)?,
            )),
            "email" => Ok(Self::Email(
                serde_json::from_value(config.clone()).map_err(invalid)?,
            )),
            "webhook" => Ok(Self::Webhook(
                serde_json::from_value(config.clone()).map_err(invalid)?,
            )),
            other => Err(CoreError::Config(format!(
                "Unknown action_type: '{other}'. Must be one of: assignment, removal, email, \
                 webhook"
            ))),
        }
    }

    /// Wire-format tag for this action kind.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Assignment(_) => "assignment",
            Self::Removal(_) => "removal",
            Self::Email(_) => "email",
            Self::Webhook(_) => "webhook",
        }
    }

    /// Encode the payload back into its `jsonb` representation.
    pub fn to_config_json(&self) -> serde_json::Value {
        // Serialization of plain data structs cannot fail.
        match self {
            Self::Assignment(c) => serde_json::to_value(c),
            Self::Removal(c) => serde_json::to_value(c),
            Self::Email(c) => serde_json::to_value(c),
            Self::Webhook(c) => serde_json::to_value(c),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}

// ---------------------------------------------------------------------------
// WorkflowAction / Workflow
// ---------------------------------------------------------------------------

/// A decoded action attached to a workflow, in definition order.
#[derive(Debug, Clone)]
pub struct WorkflowAction {
    pub id: DbId,
    pub config: ActionConfig,
}

/// A decoded workflow with its ordered triggers and actions.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: DbId,
    pub name: String,
    /// Evaluation and merge precedence; ascending.
    pub order: i32,
    pub enabled: bool,
    pub triggers: Vec<WorkflowTrigger>,
    pub actions: Vec<WorkflowAction>,
}

impl Workflow {
    /// Triggers of the given event type, in definition order.
    pub fn triggers_of_type(&self, trigger_type: TriggerType) -> impl Iterator<Item = &WorkflowTrigger> {
        self.triggers
            .iter()
            .filter(move |t| t.trigger_type == trigger_type)
    }

    /// Whether the workflow has at least one trigger of the given type.
    pub fn has_trigger_of_type(&self, trigger_type: TriggerType) -> bool {
        self.triggers_of_type(trigger_type).next().is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
