//! Duplicate detection within a single source.
//!
//! Single pass over the items, keyed by the normalized duplicate key. An
//! item carrying a cross-reference from the other source (a record with a
//! `google_event_id`, an event referenced by some record) is canonical and
//! never flagged. When neither side of a collision is canonical the item
//! with the larger id is flagged, so the flagged set does not depend on
//! input order.

use std::collections::{HashMap, HashSet, hash_map::Entry};

use chrono::Duration;
use tracing::debug;

use crate::compare::normalize;
use crate::event::CalendarEvent;
use crate::record::LedgerRecord;

/// Generic single-pass duplicate scan. O(n) time and space.
pub fn find_duplicates<T, K, I, C>(
    items: &[T],
    key_of: K,
    id_of: I,
    is_canonical: C,
) -> HashSet<String>
where
    K: Fn(&T) -> String,
    I: Fn(&T) -> &str,
    C: Fn(&T) -> bool,
{
    let mut kept: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut duplicates = HashSet::new();

    for (idx, item) in items.iter().enumerate() {
        match kept.entry(key_of(item)) {
            Entry::Vacant(slot) => {
                slot.insert(idx);
            }
            Entry::Occupied(mut slot) => {
                let other = &items[*slot.get()];
                let keep_current = match (is_canonical(item), is_canonical(other)) {
                    (true, false) => true,
                    (false, true) => false,
                    // id order as the deterministic tie-break
                    _ => id_of(item) < id_of(other),
                };
                if keep_current {
                    duplicates.insert(id_of(other).to_string());
                    slot.insert(idx);
                } else {
                    duplicates.insert(id_of(item).to_string());
                }
            }
        }
    }

    duplicates
}

/// Duplicate calendar events within one calendar. `referenced` holds the
/// event ids recorded in the ledger; those events are canonical.
pub fn calendar_duplicates(
    events: &[CalendarEvent],
    referenced: &HashSet<String>,
) -> HashSet<String> {
    let duplicates = find_duplicates(
        events,
        CalendarEvent::dedup_key,
        |event| event.id.as_str(),
        |event| referenced.contains(&event.id),
    );
    if !duplicates.is_empty() {
        debug!(count = duplicates.len(), "calendar duplicates detected");
    }
    duplicates
}

/// Duplicate records among the unprocessed set. A record already linked to
/// a calendar event is canonical.
pub fn ledger_duplicates(records: &[LedgerRecord]) -> HashSet<String> {
    let duplicates = find_duplicates(
        records,
        LedgerRecord::dedup_key,
        |record| record.id.as_str(),
        |record| record.google_event_id.is_some(),
    );
    if !duplicates.is_empty() {
        debug!(count = duplicates.len(), "ledger duplicates detected");
    }
    duplicates
}

/// Find the calendar event matching a record: same normalized title, start
/// within the tolerance window. An event the record already references wins
/// outright; otherwise the closest start wins.
pub fn find_matching_event<'a>(
    events: &'a [CalendarEvent],
    record: &LedgerRecord,
    window: Duration,
) -> Option<&'a CalendarEvent> {
    if let Some(linked) = record.google_event_id.as_deref() {
        if let Some(event) = events.iter().find(|event| event.id == linked) {
            return Some(event);
        }
    }

    let title = normalize(&record.title);
    events
        .iter()
        .filter(|event| normalize(&event.summary) == title)
        .filter_map(|event| {
            let gap = (event.start.to_utc() - record.start).abs();
            (gap <= window).then_some((gap, event))
        })
        .min_by_key(|(gap, _)| *gap)
        .map(|(_, event)| event)
}
