//! Action merge planner: fold matched workflows into one change-set.
//!
//! All matched workflows' actions are merged into a single [`ChangeSet`]
//! applied once per firing event. The fold runs in two phases over the
//! workflows in ascending `order` (then action definition order):
//!
//! 1. **Assignments**, over a baseline drawn from the document's persisted
//!    state: scalar fields are last-assignment-wins, collection fields
//!    union, custom-field attachment is idempotent.
//! 2. **Removals**, category by category on top of the assignment result:
//!    explicit sets subtract, `remove_all_*` clears the category outright.
//!    Removals therefore have final say for the categories they target,
//!    regardless of which workflow contributed them.
//!
//! Title templates render against the document context; a render failure
//! keeps the document's original title and is recorded without aborting
//! the rest of the plan.

use std::collections::{HashMap, HashSet};

use crate::document::DocumentSnapshot;
use crate::template;
use crate::types::DbId;
use crate::workflow::{
    ActionConfig, AssignmentConfig, EmailActionConfig, RemovalConfig, WebhookActionConfig,
    Workflow,
};

// ---------------------------------------------------------------------------
// NotificationAction
// ---------------------------------------------------------------------------

/// A notification side effect collected during planning, dispatched by the
/// executor after the metadata transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationAction {
    Email(EmailActionConfig),
    Webhook(WebhookActionConfig),
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// The consolidated, pre-commit mutation computed from all matched
/// workflows.
///
/// Scalars use `None` = untouched, `Some(None)` = clear, `Some(Some(id))` =
/// set. Collections hold the desired final membership (seeded from the
/// document's persisted sets). `custom_fields` maps every desired field to
/// the value staged for it — staged values only apply to fields not yet
/// attached to the document.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub title: Option<String>,
    pub correspondent: Option<Option<DbId>>,
    pub document_type: Option<Option<DbId>>,
    pub storage_path: Option<Option<DbId>>,
    pub owner: Option<Option<DbId>>,

    pub tags: HashSet<DbId>,
    pub view_users: HashSet<DbId>,
    pub change_users: HashSet<DbId>,
    pub view_groups: HashSet<DbId>,
    pub change_groups: HashSet<DbId>,
    pub custom_fields: HashMap<DbId, Option<String>>,

    pub notifications: Vec<NotificationAction>,
    /// Non-fatal template errors collected during planning.
    pub errors: Vec<String>,
}

impl ChangeSet {
    /// Seed the collection state from the document's persisted sets.
    fn baseline(snapshot: &DocumentSnapshot) -> Self {
        Self {
            tags: snapshot.tags.clone(),
            view_users: snapshot.view_users.clone(),
            change_users: snapshot.change_users.clone(),
            view_groups: snapshot.view_groups.clone(),
            change_groups: snapshot.change_groups.clone(),
            custom_fields: snapshot.custom_fields.clone(),
            ..Default::default()
        }
    }

    /// Whether applying this change-set would alter the document at all.
    pub fn has_document_changes(&self, snapshot: &DocumentSnapshot) -> bool {
        self.title.is_some()
            || self.correspondent.is_some()
            || self.document_type.is_some()
            || self.storage_path.is_some()
            || self.owner.is_some()
            || self.tags != snapshot.tags
            || self.view_users != snapshot.view_users
            || self.change_users != snapshot.change_users
            || self.view_groups != snapshot.view_groups
            || self.change_groups != snapshot.change_groups
            || self.custom_fields.keys().collect::<HashSet<_>>()
                != snapshot.custom_fields.keys().collect::<HashSet<_>>()
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Compute the net change-set for one document from the matched workflows.
///
/// `matched` is evaluated in ascending workflow `order` (ties broken by id),
/// actions within a workflow in definition order.
pub fn build_change_set(snapshot: &DocumentSnapshot, matched: &[&Workflow]) -> ChangeSet {
    let mut ordered: Vec<&Workflow> = matched.to_vec();
    ordered.sort_by_key(|w| (w.order, w.id));

    let mut change_set = ChangeSet::baseline(snapshot);

    // Phase 1: assignments and notification collection.
    for workflow in &ordered {
        for action in &workflow.actions {
            match &action.config {
                ActionConfig::Assignment(assign) => {
                    apply_assignment(&mut change_set, snapshot, assign);
                }
                ActionConfig::Email(email) => {
                    change_set
                        .notifications
                        .push(NotificationAction::Email(email.clone()));
                }
                ActionConfig::Webhook(webhook) => {
                    change_set
                        .notifications
                        .push(NotificationAction::Webhook(webhook.clone()));
                }
                ActionConfig::Removal(_) => {}
            }
        }
    }

    // Phase 2: removals net out after all assignments.
    for workflow in &ordered {
        for action in &workflow.actions {
            if let ActionConfig::Removal(removal) = &action.config {
                apply_removal(&mut change_set, snapshot, removal);
            }
        }
    }

    change_set
}

fn apply_assignment(
    change_set: &mut ChangeSet,
    snapshot: &DocumentSnapshot,
    assign: &AssignmentConfig,
) {
    if let Some(template) = &assign.title {
        match template::render(template, snapshot) {
            Ok(title) => change_set.title = Some(title),
            Err(e) => {
                tracing::warn!(
                    document_id = snapshot.id,
                    error = %e,
                    "Keeping original document title"
                );
                change_set.errors.push(e.to_string());
            }
        }
    }

    if let Some(id) = assign.correspondent {
        change_set.correspondent = Some(Some(id));
    }
    if let Some(id) = assign.document_type {
        change_set.document_type = Some(Some(id));
    }
    if let Some(id) = assign.storage_path {
        change_set.storage_path = Some(Some(id));
    }
    if let Some(id) = assign.owner {
        change_set.owner = Some(Some(id));
    }

    change_set.tags.extend(assign.tags.iter().copied());
    change_set.view_users.extend(assign.view_users.iter().copied());
    change_set.change_users.extend(assign.change_users.iter().copied());
    change_set.view_groups.extend(assign.view_groups.iter().copied());
    change_set.change_groups.extend(assign.change_groups.iter().copied());

    for field_id in &assign.custom_fields {
        // Idempotent: a field already attached to the document keeps its
        // existing value; a staged value only applies on first attachment.
        change_set
            .custom_fields
            .entry(*field_id)
            .or_insert_with(|| assign.custom_field_values.get(field_id).cloned());
    }
}

fn apply_removal(
    change_set: &mut ChangeSet,
    snapshot: &DocumentSnapshot,
    removal: &RemovalConfig,
) {
    if removal.remove_all_tags {
        change_set.tags.clear();
    } else {
        for id in &removal.tags {
            change_set.tags.remove(id);
        }
    }

    remove_scalar(
        &mut change_set.correspondent,
        snapshot.correspondent_id(),
        removal.remove_all_correspondents,
        &removal.correspondents,
    );
    remove_scalar(
        &mut change_set.document_type,
        snapshot.document_type_id(),
        removal.remove_all_document_types,
        &removal.document_types,
    );
    remove_scalar(
        &mut change_set.storage_path,
        snapshot.storage_path_id(),
        removal.remove_all_storage_paths,
        &removal.storage_paths,
    );
    remove_scalar(
        &mut change_set.owner,
        snapshot.owner_id(),
        removal.remove_all_owners,
        &removal.owners,
    );

    if removal.remove_all_permissions {
        change_set.view_users.clear();
        change_set.change_users.clear();
        change_set.view_groups.clear();
        change_set.change_groups.clear();
    } else {
        for id in &removal.view_users {
            change_set.view_users.remove(id);
        }
        for id in &removal.change_users {
            change_set.change_users.remove(id);
        }
        for id in &removal.view_groups {
            change_set.view_groups.remove(id);
        }
        for id in &removal.change_groups {
            change_set.change_groups.remove(id);
        }
    }

    if removal.remove_all_custom_fields {
        change_set.custom_fields.clear();
    } else {
        for id in &removal.custom_fields {
            change_set.custom_fields.remove(id);
        }
    }
}

/// Clear a pending scalar when the removal targets its effective value.
///
/// The effective value is the pending assignment if one exists, otherwise
/// the document's persisted value. Removals only clear — they never set.
fn remove_scalar(
    pending: &mut Option<Option<DbId>>,
    persisted: Option<DbId>,
    remove_all: bool,
    remove_ids: &[DbId],
) {
    if remove_all {
        *pending = Some(None);
        return;
    }
    let effective = pending.unwrap_or(persisted);
    if let Some(id) = effective {
        if remove_ids.contains(&id) {
            *pending = Some(None);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
