//! Trigger evaluation: does a document match a workflow for an event type?
//!
//! A trigger matches iff every configured filter passes; an unset filter is
//! vacuously true. A workflow matches iff any of its triggers of the
//! requested type matches. Filter checks short-circuit per trigger — the
//! first failing filter names itself in the outcome's `reason` — but the
//! workflow-level "did not match" line is always emitted with the collected
//! reasons. Filters that reference data the document lacks (e.g. a mail
//! rule filter on a non-mail document) are a non-match, not an error.

use crate::document::DocumentSnapshot;
use crate::matching::{glob_matches, tags_superset, ContentMatcher};
use crate::workflow::{MatchingAlgorithm, TriggerType, Workflow, WorkflowTrigger};

// ---------------------------------------------------------------------------
// TriggerOutcome
// ---------------------------------------------------------------------------

/// Explicit match verdict with a human-readable reason for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    pub matched: bool,
    pub reason: String,
}

impl TriggerOutcome {
    pub fn matched(reason: impl Into<String>) -> Self {
        Self {
            matched: true,
            reason: reason.into(),
        }
    }

    pub fn not_matched(reason: impl Into<String>) -> Self {
        Self {
            matched: false,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-filter checks
// ---------------------------------------------------------------------------

fn check_source(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> Option<String> {
    if trigger.sources.is_empty() {
        return None;
    }
    match snapshot.source {
        Some(source) if trigger.sources.contains(&source) => None,
        other => {
            let mut allowed: Vec<&str> = trigger.sources.iter().map(|s| s.as_str()).collect();
            allowed.sort_unstable();
            Some(format!(
                "Document source {:?} is not one of {allowed:?}",
                other.map(|s| s.as_str())
            ))
        }
    }
}

fn check_filename(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> Option<String> {
    let pattern = trigger.filter_filename.as_deref()?;
    match snapshot.original_filename.as_deref() {
        Some(filename) if glob_matches(pattern, filename) => None,
        Some(filename) => Some(format!(
            "Document filename '{filename}' does not match '{pattern}'"
        )),
        None => Some(format!("Document has no filename to match '{pattern}'")),
    }
}

fn check_path(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> Option<String> {
    let pattern = trigger.filter_path.as_deref()?;
    match snapshot.source_path.as_deref() {
        Some(path) if glob_matches(pattern, path) => None,
        Some(path) => Some(format!("Document path '{path}' does not match '{pattern}'")),
        None => Some(format!("Document has no path to match '{pattern}'")),
    }
}

fn check_mailrule(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> Option<String> {
    let rule_id = trigger.filter_mailrule_id?;
    if snapshot.mailrule_id == Some(rule_id) {
        None
    } else {
        Some(format!(
            "Document mail rule {:?} does not match {rule_id}",
            snapshot.mailrule_id
        ))
    }
}

fn check_tags(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> Option<String> {
    if trigger.filter_has_tags.is_empty() || tags_superset(&snapshot.tags, &trigger.filter_has_tags)
    {
        return None;
    }
    let mut have: Vec<_> = snapshot.tags.iter().copied().collect();
    let mut want: Vec<_> = trigger.filter_has_tags.iter().copied().collect();
    have.sort_unstable();
    want.sort_unstable();
    Some(format!("Document tags {have:?} do not contain all of {want:?}"))
}

fn check_document_type(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> Option<String> {
    let wanted = trigger.filter_has_document_type?;
    if snapshot.document_type_id() == Some(wanted) {
        None
    } else {
        Some(format!(
            "Document type {:?} does not match {wanted}",
            snapshot.document_type_id()
        ))
    }
}

fn check_correspondent(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> Option<String> {
    let wanted = trigger.filter_has_correspondent?;
    if snapshot.correspondent_id() == Some(wanted) {
        None
    } else {
        Some(format!(
            "Document correspondent {:?} does not match {wanted}",
            snapshot.correspondent_id()
        ))
    }
}

fn check_content(
    snapshot: &DocumentSnapshot,
    trigger: &WorkflowTrigger,
    matcher: &dyn ContentMatcher,
) -> Option<String> {
    if trigger.matching_algorithm == MatchingAlgorithm::None {
        return None;
    }
    if matcher.matches(
        trigger.matching_algorithm,
        &trigger.match_pattern,
        trigger.is_insensitive,
        &snapshot.content,
    ) {
        None
    } else {
        Some(format!(
            "Document content did not match algorithm '{}' pattern '{}'",
            trigger.matching_algorithm, trigger.match_pattern
        ))
    }
}

// ---------------------------------------------------------------------------
// Trigger / workflow evaluation
// ---------------------------------------------------------------------------

/// Evaluate a single trigger against a document snapshot.
///
/// The checks run in a fixed order (source, filename, path, mail rule,
/// tags, document type, correspondent, content) and the first failure
/// short-circuits the rest of the chain.
pub fn trigger_matches(
    snapshot: &DocumentSnapshot,
    trigger: &WorkflowTrigger,
    matcher: &dyn ContentMatcher,
) -> TriggerOutcome {
    let failure = check_source(snapshot, trigger)
        .or_else(|| check_filename(snapshot, trigger))
        .or_else(|| check_path(snapshot, trigger))
        .or_else(|| check_mailrule(snapshot, trigger))
        .or_else(|| check_tags(snapshot, trigger))
        .or_else(|| check_document_type(snapshot, trigger))
        .or_else(|| check_correspondent(snapshot, trigger))
        .or_else(|| check_content(snapshot, trigger, matcher));

    match failure {
        None => TriggerOutcome::matched(format!("Trigger {} matched", trigger.id)),
        Some(reason) => TriggerOutcome::not_matched(reason),
    }
}

/// Evaluate a workflow against a document for the requested event type.
///
/// Matches iff any trigger of that type matches. Scheduled due-ness and the
/// run ledger are handled by the sweep; this only evaluates filters.
pub fn workflow_matches(
    snapshot: &DocumentSnapshot,
    workflow: &Workflow,
    trigger_type: TriggerType,
    matcher: &dyn ContentMatcher,
) -> TriggerOutcome {
    let mut reasons: Vec<String> = Vec::new();

    for trigger in workflow.triggers_of_type(trigger_type) {
        let outcome = trigger_matches(snapshot, trigger, matcher);
        if outcome.matched {
            tracing::debug!(
                document_id = snapshot.id,
                workflow = %workflow.name,
                trigger_id = trigger.id,
                "Document matched workflow"
            );
            return outcome;
        }
        reasons.push(outcome.reason);
    }

    let reason = if reasons.is_empty() {
        format!("No {trigger_type} triggers configured")
    } else {
        reasons.join("; ")
    };
    tracing::debug!(
        document_id = snapshot.id,
        workflow = %workflow.name,
        reason = %reason,
        "Document did not match workflow"
    );
    TriggerOutcome::not_matched(reason)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentSource, NamedRef};
    use crate::matching::PatternMatcher;
    use crate::test_support::{snapshot, workflow_with_trigger};
    use crate::workflow::WorkflowTrigger;

    fn eval(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> TriggerOutcome {
        trigger_matches(snapshot, trigger, &PatternMatcher)
    }

    // -- wildcard -----------------------------------------------------------

    #[test]
    fn wildcard_trigger_matches_everything() {
        let doc = snapshot();
        for trigger_type in [
            TriggerType::Consumption,
            TriggerType::DocumentAdded,
            TriggerType::DocumentUpdated,
            TriggerType::Scheduled,
        ] {
            let trigger = WorkflowTrigger::wildcard(1, trigger_type);
            assert!(eval(&doc, &trigger).matched, "{trigger_type} wildcard failed");
        }
    }

    // -- individual filters -------------------------------------------------

    #[test]
    fn source_filter_accepts_listed_source() {
        let mut doc = snapshot();
        doc.source = Some(DocumentSource::ConsumeFolder);
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        trigger.sources = [DocumentSource::ConsumeFolder].into();
        assert!(eval(&doc, &trigger).matched);
    }

    #[test]
    fn source_filter_rejects_other_source() {
        let mut doc = snapshot();
        doc.source = Some(DocumentSource::ApiUpload);
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        trigger.sources = [DocumentSource::ConsumeFolder].into();
        let outcome = eval(&doc, &trigger);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("source"));
    }

    #[test]
    fn filename_filter_glob() {
        let mut doc = snapshot();
        doc.original_filename = Some("simple.pdf".into());
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        trigger.filter_filename = Some("*simple*".into());
        assert!(eval(&doc, &trigger).matched);

        doc.original_filename = Some("other.pdf".into());
        let outcome = eval(&doc, &trigger);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("filename"));
    }

    #[test]
    fn filename_filter_missing_filename_is_non_match() {
        let mut doc = snapshot();
        doc.original_filename = None;
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        trigger.filter_filename = Some("*.pdf".into());
        let outcome = eval(&doc, &trigger);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("no filename"));
    }

    #[test]
    fn path_filter_uses_shell_glob_semantics() {
        let mut doc = snapshot();
        doc.source_path = Some("/tmp/scratch/x/simple.pdf".into());
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        trigger.filter_path = Some("*/scratch/*".into());
        assert!(eval(&doc, &trigger).matched);
    }

    #[test]
    fn mailrule_filter_on_non_mail_document_is_non_match() {
        let doc = snapshot();
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        trigger.filter_mailrule_id = Some(12);
        let outcome = eval(&doc, &trigger);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("mail rule"));
    }

    #[test]
    fn tags_filter_requires_superset() {
        let mut doc = snapshot();
        doc.tags = [1].into();
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::DocumentAdded);
        trigger.filter_has_tags = [1, 2].into();
        let outcome = eval(&doc, &trigger);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("tags"));

        doc.tags = [1, 2, 3].into();
        assert!(eval(&doc, &trigger).matched);
    }

    #[test]
    fn document_type_filter() {
        let mut doc = snapshot();
        doc.document_type = Some(NamedRef::new(4, "Invoice"));
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::DocumentAdded);
        trigger.filter_has_document_type = Some(4);
        assert!(eval(&doc, &trigger).matched);

        trigger.filter_has_document_type = Some(5);
        assert!(!eval(&doc, &trigger).matched);
    }

    #[test]
    fn correspondent_filter() {
        let mut doc = snapshot();
        doc.correspondent = Some(NamedRef::new(9, "ACME"));
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::DocumentAdded);
        trigger.filter_has_correspondent = Some(9);
        assert!(eval(&doc, &trigger).matched);

        doc.correspondent = None;
        let outcome = eval(&doc, &trigger);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("correspondent"));
    }

    #[test]
    fn content_filter_literal() {
        let mut doc = snapshot();
        doc.content = "Your electricity bill for March".into();
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        trigger.matching_algorithm = MatchingAlgorithm::Literal;
        trigger.match_pattern = "electricity bill".into();
        assert!(eval(&doc, &trigger).matched);

        doc.content = "meeting minutes".into();
        let outcome = eval(&doc, &trigger);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("literal"));
    }

    // -- short-circuit order ------------------------------------------------

    #[test]
    fn first_failing_filter_names_itself() {
        // Both the filename and the tag filter would fail; filename comes
        // first in the chain and owns the reason.
        let mut doc = snapshot();
        doc.original_filename = Some("other.pdf".into());
        let mut trigger = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        trigger.filter_filename = Some("*simple*".into());
        trigger.filter_has_tags = [99].into();
        let outcome = eval(&doc, &trigger);
        assert!(outcome.reason.contains("filename"));
        assert!(!outcome.reason.contains("tags"));
    }

    // -- workflow-level evaluation -----------------------------------------

    #[test]
    fn workflow_matches_any_trigger_of_type() {
        let mut miss = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        miss.filter_filename = Some("*.png".into());
        let hit = WorkflowTrigger::wildcard(2, TriggerType::Consumption);

        let mut workflow = workflow_with_trigger(1, miss);
        workflow.triggers.push(hit);

        let mut doc = snapshot();
        doc.original_filename = Some("scan.pdf".into());
        let outcome = workflow_matches(&doc, &workflow, TriggerType::Consumption, &PatternMatcher);
        assert!(outcome.matched);
    }

    #[test]
    fn workflow_without_matching_type_reports_reason() {
        let workflow = workflow_with_trigger(
            1,
            WorkflowTrigger::wildcard(1, TriggerType::Consumption),
        );
        let doc = snapshot();
        let outcome = workflow_matches(&doc, &workflow, TriggerType::Scheduled, &PatternMatcher);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("No scheduled triggers"));
    }

    #[test]
    fn workflow_no_match_collects_all_trigger_reasons() {
        let mut t1 = WorkflowTrigger::wildcard(1, TriggerType::Consumption);
        t1.filter_filename = Some("*.png".into());
        let mut t2 = WorkflowTrigger::wildcard(2, TriggerType::Consumption);
        t2.filter_has_tags = [42].into();

        let mut workflow = workflow_with_trigger(1, t1);
        workflow.triggers.push(t2);

        let mut doc = snapshot();
        doc.original_filename = Some("scan.pdf".into());
        let outcome = workflow_matches(&doc, &workflow, TriggerType::Consumption, &PatternMatcher);
        assert!(!outcome.matched);
        assert!(outcome.reason.contains("filename"));
        assert!(outcome.reason.contains("tags"));
    }
}
