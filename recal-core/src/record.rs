//! Ledger record types.
//!
//! Records are created externally in the record store; the engine only reads
//! them and writes back sync state (`google_event_id`, `processed`) via
//! partial updates. Records are never deleted by this system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compare::normalize;

/// A scheduling record from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Opaque, stable id assigned by the ledger.
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: Option<String>,

    // Address parts, composed into a single location string.
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,

    /// Contact the appointment is for (e.g. the homeowner).
    pub contact_name: Option<String>,
    /// Billing annotation prefixed to the composed description when present.
    pub billing_status: Option<String>,
    pub attendee_email: Option<String>,

    /// Free-text tag binding the record to one calendar.
    pub calendar_key: String,

    /// Foreign key into the calendar, written back after a successful sync.
    pub google_event_id: Option<String>,
    /// Sync state flag; also doubles as the in-progress lock during a run.
    pub processed: bool,
}

impl LedgerRecord {
    /// Compose the address parts into a single location string.
    /// Empty or missing parts are skipped.
    pub fn location(&self) -> String {
        [&self.street, &self.city, &self.region]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The description as pushed to the calendar: the billing annotation,
    /// when present, prefixed to the record's own description.
    pub fn composed_description(&self) -> String {
        let body = self.description.as_deref().unwrap_or("").trim();
        match self.billing_status.as_deref().map(str::trim) {
            Some(billing) if !billing.is_empty() => {
                if body.is_empty() {
                    format!("[{billing}]")
                } else {
                    format!("[{billing}] {body}")
                }
            }
            _ => body.to_string(),
        }
    }

    /// Normalized duplicate-detection key: trimmed lower-cased title, the
    /// exact start instant, and the calendar key as disambiguator.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}",
            normalize(&self.title),
            self.start.to_rfc3339(),
            normalize(&self.calendar_key)
        )
    }
}

/// Partial update for a ledger record.
///
/// Fields left as `None` are omitted from the request entirely and must be
/// left untouched server-side. `google_event_id` uses a double option: the
/// inner `None` clears the field (serialized as an explicit null).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_event_id: Option<Option<String>>,
}

impl RecordPatch {
    /// Mark the record as in-progress before touching the calendar.
    pub fn lock() -> Self {
        RecordPatch {
            processed: Some(true),
            google_event_id: None,
        }
    }

    /// Clear the in-progress marker, leaving other fields untouched.
    pub fn unlock() -> Self {
        RecordPatch {
            processed: Some(false),
            google_event_id: None,
        }
    }

    /// Record a successful sync against the given calendar event.
    pub fn synced(event_id: impl Into<String>) -> Self {
        RecordPatch {
            processed: Some(true),
            google_event_id: Some(Some(event_id.into())),
        }
    }

    /// Detach the record from the calendar so the next incremental run
    /// recreates its event.
    pub fn reset() -> Self {
        RecordPatch {
            processed: Some(false),
            google_event_id: Some(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_none() && self.google_event_id.is_none()
    }
}
