//! Calendar event types.
//!
//! Events are created, updated, and deleted exclusively through a
//! `CalendarApi` implementation, driven by engine decisions.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::compare::normalize;
use crate::record::LedgerRecord;

/// Start or end of a calendar event: a full instant for timed events, a
/// bare date for all-day events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl EventTime {
    /// Resolve to an instant; all-day dates resolve to midnight UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => *dt,
            EventTime::Date(date) => date
                .and_hms_opt(0, 0, 0)
                .unwrap_or_default()
                .and_utc(),
        }
    }

    /// The instant rounded down to the minute, as used in duplicate keys.
    pub fn floor_minute(&self) -> DateTime<Utc> {
        let dt = self.to_utc();
        dt.with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(dt)
    }
}

/// A calendar event as fetched from the calendar service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Opaque id assigned by the calendar service.
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    /// Attendee email addresses.
    pub attendees: Vec<String>,
}

impl CalendarEvent {
    /// Normalized duplicate-detection key: trimmed lower-cased summary and
    /// the start instant rounded down to the minute.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}",
            normalize(&self.summary),
            self.start.floor_minute().to_rfc3339()
        )
    }
}

/// Payload for creating (or replacing) a calendar event from a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: Vec<String>,
}

impl NewEvent {
    /// Build the event a record should be represented by on the calendar.
    pub fn from_record(record: &LedgerRecord) -> Self {
        let description = record.composed_description();
        let location = record.location();

        NewEvent {
            summary: record.title.trim().to_string(),
            description: (!description.is_empty()).then_some(description),
            location: (!location.is_empty()).then_some(location),
            start: record.start,
            end: record.end,
            attendees: record
                .attendee_email
                .iter()
                .map(|email| email.trim().to_string())
                .collect(),
        }
    }
}
