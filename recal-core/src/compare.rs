//! Cross-source difference detection.
//!
//! Decides whether a ledger record and its calendar event have drifted
//! apart. Pure comparison, no side effects beyond debug logging; absent
//! calendar sub-fields compare as empty strings.

use tracing::debug;

use crate::event::{CalendarEvent, EventTime};
use crate::record::LedgerRecord;

/// Normalize free text for comparison: trimmed, lower-cased.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn normalize_opt(text: Option<&str>) -> String {
    normalize(text.unwrap_or(""))
}

/// Whether the calendar event no longer matches the record.
///
/// Text fields compare after normalization, instants compare exactly (all-day
/// dates resolve to midnight UTC first). When the record names an attendee
/// email, it must be present in the event's attendee set, case-insensitively.
/// Description only participates when `compare_description` is set.
pub fn is_different(
    record: &LedgerRecord,
    event: &CalendarEvent,
    compare_description: bool,
) -> bool {
    if normalize(&record.title) != normalize(&event.summary) {
        debug!(record = %record.id, event = %event.id, "title differs");
        return true;
    }

    if normalize(&record.location()) != normalize_opt(event.location.as_deref()) {
        debug!(record = %record.id, event = %event.id, "location differs");
        return true;
    }

    if compare_description
        && normalize(&record.composed_description()) != normalize_opt(event.description.as_deref())
    {
        debug!(record = %record.id, event = %event.id, "description differs");
        return true;
    }

    if record.start != event.start.to_utc() {
        debug!(record = %record.id, event = %event.id, "start differs");
        return true;
    }

    if record.end != event.end.to_utc() {
        debug!(record = %record.id, event = %event.id, "end differs");
        return true;
    }

    if let Some(email) = record.attendee_email.as_deref() {
        let wanted = normalize(email);
        let present = event
            .attendees
            .iter()
            .any(|attendee| normalize(attendee) == wanted);
        if !present {
            debug!(record = %record.id, event = %event.id, "attendee missing");
            return true;
        }
    }

    false
}
