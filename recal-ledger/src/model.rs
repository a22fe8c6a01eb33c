//! Wire types for the record store API.
//!
//! Records come back as `{ "id": ..., "fields": { ... } }` with camelCase
//! field names; listings paginate with an `offset` token. Partial updates
//! send only the touched fields, with an explicit null to clear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use recal_core::{LedgerRecord, RecordPatch};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordList {
    pub records: Vec<WireRecord>,
    pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireRecord {
    pub id: String,
    #[serde(default)]
    pub fields: WireFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireFields {
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub contact_name: Option<String>,
    pub billing_status: Option<String>,
    pub attendee_email: Option<String>,
    pub calendar_key: String,
    pub google_event_id: Option<String>,
    pub processed: bool,
}

impl WireRecord {
    /// Convert to the core record. Records without both instants cannot be
    /// scheduled and are dropped here with a warning; records with other
    /// gaps (e.g. an empty title) pass through for the engine to report.
    pub fn into_record(self) -> Option<LedgerRecord> {
        let WireRecord { id, fields } = self;
        let (Some(start), Some(end)) = (fields.start, fields.end) else {
            warn!(record = %id, "record is missing start or end, skipping");
            return None;
        };

        Some(LedgerRecord {
            id,
            title: fields.title,
            start,
            end,
            description: fields.description,
            street: fields.street,
            city: fields.city,
            region: fields.region,
            contact_name: fields.contact_name,
            billing_status: fields.billing_status,
            attendee_email: fields.attendee_email,
            calendar_key: fields.calendar_key,
            google_event_id: fields.google_event_id,
            processed: fields.processed,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PatchFields<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    processed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_event_id: Option<&'a Option<String>>,
}

/// Request body for a partial record update. Untouched fields are omitted
/// entirely; clearing `google_event_id` sends an explicit null.
pub fn patch_body(patch: &RecordPatch) -> serde_json::Value {
    json!({
        "fields": PatchFields {
            processed: patch.processed,
            google_event_id: patch.google_event_id.as_ref(),
        }
    })
}
