//! Scheduled-trigger clock: is a time-based trigger due for a document?
//!
//! The clock is a pure function of its inputs; the run-ledger lookup that
//! produces `last_run` is done by the sweep. A trigger is due when `now`
//! has passed the reference date shifted by `schedule_offset_days`
//! (negative offsets fire before the date). Due-ness is then gated by the
//! ledger: non-recurring triggers fire once ever, recurring triggers fire
//! again only after the recurring interval has elapsed.

use chrono::Duration;

use crate::document::DocumentSnapshot;
use crate::types::Timestamp;
use crate::workflow::{ScheduleDateField, WorkflowTrigger};

// ---------------------------------------------------------------------------
// ScheduleDecision
// ---------------------------------------------------------------------------

/// Outcome of the per-document schedule check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Due and not suppressed by the run ledger.
    Fire,
    /// The offset reference date is still in the future.
    NotDue,
    /// The document has no usable reference date for this trigger.
    NoReferenceDate,
    /// Non-recurring trigger that already produced a run for this document.
    AlreadyRan,
    /// Recurring trigger whose last run is newer than the interval.
    WithinRecurringInterval,
}

impl ScheduleDecision {
    pub fn should_fire(&self) -> bool {
        matches!(self, Self::Fire)
    }
}

// ---------------------------------------------------------------------------
// Reference date
// ---------------------------------------------------------------------------

/// Parse a custom-field value as either an RFC 3339 datetime or a plain
/// `YYYY-MM-DD` date (taken at midnight UTC).
fn parse_date_value(value: &str) -> Option<Timestamp> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Compute the date a scheduled trigger is anchored to, if the document
/// has one.
pub fn reference_date(snapshot: &DocumentSnapshot, trigger: &WorkflowTrigger) -> Option<Timestamp> {
    match trigger.schedule_date_field {
        ScheduleDateField::Created => Some(snapshot.created),
        ScheduleDateField::Added => Some(snapshot.added),
        ScheduleDateField::Modified => Some(snapshot.modified),
        ScheduleDateField::CustomField => {
            let field_id = trigger.schedule_date_custom_field?;
            let value = snapshot.custom_fields.get(&field_id)?.as_deref()?;
            let parsed = parse_date_value(value);
            if parsed.is_none() {
                tracing::debug!(
                    document_id = snapshot.id,
                    field_id,
                    value,
                    "Custom field value is not a date; treating as absent"
                );
            }
            parsed
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Decide whether a scheduled trigger fires for a document right now.
pub fn decide(
    now: Timestamp,
    snapshot: &DocumentSnapshot,
    trigger: &WorkflowTrigger,
    last_run: Option<Timestamp>,
) -> ScheduleDecision {
    let Some(reference) = reference_date(snapshot, trigger) else {
        return ScheduleDecision::NoReferenceDate;
    };

    let due_at = reference + Duration::days(trigger.schedule_offset_days.into());
    if now < due_at {
        return ScheduleDecision::NotDue;
    }

    match last_run {
        None => ScheduleDecision::Fire,
        Some(_) if !trigger.schedule_is_recurring => ScheduleDecision::AlreadyRan,
        Some(last) => {
            let interval = Duration::days(trigger.schedule_recurring_interval_days.into());
            if now - last >= interval {
                ScheduleDecision::Fire
            } else {
                tracing::debug!(
                    document_id = snapshot.id,
                    trigger_id = trigger.id,
                    "Last run was within the recurring interval"
                );
                ScheduleDecision::WithinRecurringInterval
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
