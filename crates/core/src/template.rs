//! Placeholder template rendering for titles and notifications.
//!
//! Templates substitute `{placeholder}` tokens against a document context,
//! e.g. `"{correspondent} — {created_year}"`. Unknown placeholders are a
//! template error: the caller keeps the original value, records the error,
//! and continues with its remaining actions.

use regex::Regex;
use std::sync::OnceLock;

use crate::document::DocumentSnapshot;
use crate::error::CoreError;

/// Date format used by the full-date placeholders.
const DATE_FORMAT: &str = "%Y-%m-%d";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"))
}

/// Resolve one placeholder name against the document snapshot.
///
/// Missing optional entities (e.g. no correspondent) render as the empty
/// string; only an unrecognized placeholder name is an error.
fn resolve(name: &str, snapshot: &DocumentSnapshot) -> Option<String> {
    let named = |r: &Option<crate::document::NamedRef>| {
        r.as_ref().map(|n| n.name.clone()).unwrap_or_default()
    };
    let value = match name {
        "correspondent" => named(&snapshot.correspondent),
        "document_type" => named(&snapshot.document_type),
        "storage_path" => named(&snapshot.storage_path),
        "owner_username" => named(&snapshot.owner),
        "original_filename" => snapshot.original_filename.clone().unwrap_or_default(),
        "doc_title" => snapshot.title.clone(),
        "doc_id" => snapshot.id.to_string(),
        "created" => snapshot.created.format(DATE_FORMAT).to_string(),
        "created_year" => snapshot.created.format("%Y").to_string(),
        "created_month" => snapshot.created.format("%m").to_string(),
        "created_day" => snapshot.created.format("%d").to_string(),
        "added" => snapshot.added.format(DATE_FORMAT).to_string(),
        "added_year" => snapshot.added.format("%Y").to_string(),
        "added_month" => snapshot.added.format("%m").to_string(),
        "added_day" => snapshot.added.format("%d").to_string(),
        _ => return None,
    };
    Some(value)
}

/// Render a template against a document snapshot.
///
/// Returns `CoreError::Template` naming the first unknown placeholder.
pub fn render(template: &str, snapshot: &DocumentSnapshot) -> Result<String, CoreError> {
    let mut unknown: Option<String> = None;
    let rendered = placeholder_re().replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match resolve(name, snapshot) {
            Some(value) => value,
            None => {
                if unknown.is_none() {
                    unknown = Some(name.to_string());
                }
                String::new()
            }
        }
    });

    match unknown {
        Some(name) => Err(CoreError::Template(format!(
            "Unknown placeholder '{{{name}}}' in template '{template}'"
        ))),
        None => Ok(rendered.into_owned()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
