//! Read-only document snapshot consumed by the workflow engine.
//!
//! The snapshot flattens a document row together with its tag/ACL link sets,
//! custom-field instances, and the display names needed for template
//! rendering. It is assembled by the persistence layer and never mutated by
//! the evaluator or planner.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// DocumentSource
// ---------------------------------------------------------------------------

/// Where a document entered the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    ConsumeFolder,
    ApiUpload,
    MailFetch,
}

impl DocumentSource {
    /// Return the wire-format string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsumeFolder => "consume_folder",
            Self::ApiUpload => "api_upload",
            Self::MailFetch => "mail_fetch",
        }
    }

    /// Parse from a wire-format string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "consume_folder" => Ok(Self::ConsumeFolder),
            "api_upload" => Ok(Self::ApiUpload),
            "mail_fetch" => Ok(Self::MailFetch),
            _ => Err(CoreError::Config(format!(
                "Invalid document source: '{s}'. Must be one of: consume_folder, api_upload, mail_fetch"
            ))),
        }
    }
}

impl std::fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NamedRef
// ---------------------------------------------------------------------------

/// A referenced metadata entity carried with its display name.
///
/// The id is what filters compare against; the name is what title and
/// notification templates render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub id: DbId,
    pub name: String,
}

impl NamedRef {
    pub fn new(id: DbId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentSnapshot
// ---------------------------------------------------------------------------

/// A consistent read-only view of one document at evaluation time.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub id: DbId,
    pub title: String,
    /// Filename as received at ingestion, matched by `filter_filename`.
    pub original_filename: Option<String>,
    /// Full storage path string, matched by `filter_path` and read for
    /// notification attachments.
    pub source_path: Option<String>,
    pub source: Option<DocumentSource>,
    /// Mail rule that produced this document, if it came from mail fetch.
    pub mailrule_id: Option<DbId>,
    /// Extracted text content, fed to the content-matching predicate.
    pub content: String,

    pub correspondent: Option<NamedRef>,
    pub document_type: Option<NamedRef>,
    pub storage_path: Option<NamedRef>,
    pub owner: Option<NamedRef>,

    pub tags: HashSet<DbId>,
    pub view_users: HashSet<DbId>,
    pub change_users: HashSet<DbId>,
    pub view_groups: HashSet<DbId>,
    pub change_groups: HashSet<DbId>,

    /// Attached custom fields: field id to instance value (which may be
    /// unset even when the field is attached).
    pub custom_fields: HashMap<DbId, Option<String>>,

    pub created: Timestamp,
    pub added: Timestamp,
    pub modified: Timestamp,
}

impl DocumentSnapshot {
    pub fn correspondent_id(&self) -> Option<DbId> {
        self.correspondent.as_ref().map(|r| r.id)
    }

    pub fn document_type_id(&self) -> Option<DbId> {
        self.document_type.as_ref().map(|r| r.id)
    }

    pub fn storage_path_id(&self) -> Option<DbId> {
        self.storage_path.as_ref().map(|r| r.id)
    }

    pub fn owner_id(&self) -> Option<DbId> {
        self.owner.as_ref().map(|r| r.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
