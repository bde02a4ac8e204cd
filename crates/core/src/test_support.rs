//! Shared builders for the unit tests in this crate.

use std::collections::{HashMap, HashSet};

use chrono::TimeZone;

use crate::document::DocumentSnapshot;
use crate::types::DbId;
use crate::workflow::{ActionConfig, TriggerType, Workflow, WorkflowAction, WorkflowTrigger};

/// A bare document snapshot with no metadata attached.
pub fn snapshot() -> DocumentSnapshot {
    let ts = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    DocumentSnapshot {
        id: 1,
        title: String::new(),
        original_filename: None,
        source_path: None,
        source: None,
        mailrule_id: None,
        content: String::new(),
        correspondent: None,
        document_type: None,
        storage_path: None,
        owner: None,
        tags: HashSet::new(),
        view_users: HashSet::new(),
        change_users: HashSet::new(),
        view_groups: HashSet::new(),
        change_groups: HashSet::new(),
        custom_fields: HashMap::new(),
        created: ts,
        added: ts,
        modified: ts,
    }
}

/// An enabled workflow holding a single trigger and no actions.
pub fn workflow_with_trigger(id: DbId, trigger: WorkflowTrigger) -> Workflow {
    Workflow {
        id,
        name: format!("workflow-{id}"),
        order: 0,
        enabled: true,
        triggers: vec![trigger],
        actions: vec![],
    }
}

/// An enabled workflow at the given `order` with the given actions.
pub fn workflow_with_actions(id: DbId, order: i32, actions: Vec<ActionConfig>) -> Workflow {
    Workflow {
        id,
        name: format!("workflow-{id}"),
        order,
        enabled: true,
        triggers: vec![],
        actions: actions
            .into_iter()
            .enumerate()
            .map(|(i, config)| WorkflowAction {
                id: (id * 100) + i as DbId,
                config,
            })
            .collect(),
    }
}
