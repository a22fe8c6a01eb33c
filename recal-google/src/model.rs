//! Wire types for the Calendar v3 API.
//!
//! The API reports missing text fields as absent keys; we deserialize them
//! into empty strings and convert to the core types' options in one place.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use recal_core::{CalendarEvent, EventTime, NewEvent};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleEventTime {
    pub date_time: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
}

impl GoogleEventTime {
    fn to_core(&self) -> Option<EventTime> {
        if let Some(instant) = self.date_time {
            Some(EventTime::DateTime(instant))
        } else {
            self.date.map(EventTime::Date)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoogleAttendee {
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleEvent {
    pub id: String,
    pub status: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: Option<GoogleEventTime>,
    pub end: Option<GoogleEventTime>,
    pub attendees: Vec<GoogleAttendee>,
}

impl GoogleEvent {
    /// Convert to the core event type. Cancelled events, events without an
    /// id, and events without usable times are dropped.
    pub fn into_core(self) -> Option<CalendarEvent> {
        if self.status == "cancelled" || self.id.is_empty() {
            return None;
        }

        let start = self.start.as_ref().and_then(GoogleEventTime::to_core)?;
        let end = self.end.as_ref().and_then(GoogleEventTime::to_core)?;

        Some(CalendarEvent {
            id: self.id,
            summary: if self.summary.is_empty() {
                "(No title)".to_string()
            } else {
                self.summary
            },
            description: (!self.description.is_empty()).then_some(self.description),
            location: (!self.location.is_empty()).then_some(self.location),
            start,
            end,
            attendees: self
                .attendees
                .into_iter()
                .map(|attendee| attendee.email)
                .filter(|email| !email.is_empty())
                .collect(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleEventList {
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

/// Request body for event creation and replacement.
pub fn event_body(event: &NewEvent) -> serde_json::Value {
    let mut body = json!({
        "summary": event.summary,
        "start": { "dateTime": event.start.to_rfc3339() },
        "end": { "dateTime": event.end.to_rfc3339() },
    });

    if let Some(description) = &event.description {
        body["description"] = json!(description);
    }
    if let Some(location) = &event.location {
        body["location"] = json!(location);
    }
    if !event.attendees.is_empty() {
        body["attendees"] = json!(
            event
                .attendees
                .iter()
                .map(|email| json!({ "email": email }))
                .collect::<Vec<_>>()
        );
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timed_event_parses_into_core() {
        let event: GoogleEvent = serde_json::from_value(json!({
            "id": "ev1",
            "status": "confirmed",
            "summary": "Install",
            "description": "Panel install",
            "location": "12 Elm St",
            "start": { "dateTime": "2025-01-10T14:00:00Z" },
            "end": { "dateTime": "2025-01-10T15:00:00+01:00" },
            "attendees": [ { "email": "crew@example.com" }, { "email": "" } ]
        }))
        .unwrap();

        let core = event.into_core().unwrap();
        assert_eq!(core.id, "ev1");
        assert_eq!(
            core.start,
            EventTime::DateTime(Utc.with_ymd_and_hms(2025, 1, 10, 14, 0, 0).unwrap())
        );
        // offsets normalize to UTC
        assert_eq!(
            core.end,
            EventTime::DateTime(Utc.with_ymd_and_hms(2025, 1, 10, 14, 0, 0).unwrap())
        );
        assert_eq!(core.attendees, vec!["crew@example.com".to_string()]);
    }

    #[test]
    fn test_all_day_event_keeps_bare_date() {
        let event: GoogleEvent = serde_json::from_value(json!({
            "id": "ev1",
            "status": "confirmed",
            "start": { "date": "2025-01-10" },
            "end": { "date": "2025-01-11" }
        }))
        .unwrap();

        let core = event.into_core().unwrap();
        assert_eq!(core.summary, "(No title)");
        assert_eq!(
            core.start,
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap())
        );
    }

    #[test]
    fn test_cancelled_and_timeless_events_are_dropped() {
        let cancelled: GoogleEvent = serde_json::from_value(json!({
            "id": "ev1",
            "status": "cancelled",
            "start": { "dateTime": "2025-01-10T14:00:00Z" },
            "end": { "dateTime": "2025-01-10T15:00:00Z" }
        }))
        .unwrap();
        assert!(cancelled.into_core().is_none());

        let timeless: GoogleEvent = serde_json::from_value(json!({
            "id": "ev2",
            "status": "confirmed"
        }))
        .unwrap();
        assert!(timeless.into_core().is_none());
    }

    #[test]
    fn test_event_body_omits_empty_fields() {
        let event = NewEvent {
            summary: "Install".to_string(),
            description: None,
            location: None,
            start: Utc.with_ymd_and_hms(2025, 1, 10, 14, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 1, 10, 15, 0, 0).unwrap(),
            attendees: vec![],
        };

        let body = event_body(&event);
        assert_eq!(body["summary"], "Install");
        assert_eq!(body["start"]["dateTime"], "2025-01-10T14:00:00+00:00");
        let keys = body.as_object().unwrap();
        assert!(!keys.contains_key("description"));
        assert!(!keys.contains_key("location"));
        assert!(!keys.contains_key("attendees"));
    }

    #[test]
    fn test_event_body_includes_attendees() {
        let event = NewEvent {
            summary: "Install".to_string(),
            description: Some("[Unpaid] Panel install".to_string()),
            location: Some("12 Elm St".to_string()),
            start: Utc.with_ymd_and_hms(2025, 1, 10, 14, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 1, 10, 15, 0, 0).unwrap(),
            attendees: vec!["crew@example.com".to_string()],
        };

        let body = event_body(&event);
        assert_eq!(body["description"], "[Unpaid] Panel install");
        assert_eq!(body["attendees"][0]["email"], "crew@example.com");
    }
}
