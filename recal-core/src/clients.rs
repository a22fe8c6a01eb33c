//! Client traits the engine consumes.
//!
//! The engine never constructs request URLs itself; everything it needs from
//! the record store and the calendar service goes through these traits, so
//! tests can drive it with in-memory implementations.

use chrono::{DateTime, Utc};

use crate::cancel::CancelFlag;
use crate::error::{SyncError, SyncResult};
use crate::event::{CalendarEvent, NewEvent};
use crate::record::{LedgerRecord, RecordPatch};

/// One page of a calendar event listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub items: Vec<CalendarEvent>,
    pub next_page_token: Option<String>,
}

/// The external record store holding the canonical list of events to be
/// scheduled.
pub trait LedgerStore {
    /// Records with `processed = false`, optionally filtered server-side by
    /// calendar key.
    async fn fetch_unprocessed(
        &self,
        calendar_key: Option<&str>,
    ) -> SyncResult<Vec<LedgerRecord>>;

    /// All records, including processed ones. Used by full-sync.
    async fn fetch_all(&self) -> SyncResult<Vec<LedgerRecord>>;

    /// Partial update; omitted fields are left untouched server-side.
    async fn update_record(&self, id: &str, patch: &RecordPatch) -> SyncResult<()>;

    /// Mark a record as in-progress.
    async fn lock(&self, id: &str) -> SyncResult<()> {
        self.update_record(id, &RecordPatch::lock()).await
    }

    /// Clear the in-progress marker.
    async fn unlock(&self, id: &str) -> SyncResult<()> {
        self.update_record(id, &RecordPatch::unlock()).await
    }
}

/// The external calendar service hosting events for end users.
pub trait CalendarApi {
    /// One page of events. Callers loop on `next_page_token` for a complete
    /// snapshot; `fetch_all_events` does exactly that.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: Option<DateTime<Utc>>,
        page_token: Option<&str>,
    ) -> SyncResult<EventPage>;

    /// `Ok(None)` when the event does not exist.
    async fn get_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> SyncResult<Option<CalendarEvent>>;

    /// Returns the id assigned by the calendar service.
    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> SyncResult<String>;

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &NewEvent,
    ) -> SyncResult<()>;

    /// Idempotent: deleting an already-deleted event is success.
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> SyncResult<()>;
}

/// Supplies a currently-valid bearer token for the calendar service.
///
/// `Err(SyncError::Auth)` when no valid token is available; the engine treats
/// that as fatal for the run and never retries or refreshes itself.
pub trait CredentialProvider: Send + Sync {
    fn current_token(&self) -> SyncResult<String>;
}

/// A fixed token, for tests and for tokens injected via configuration.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn current_token(&self) -> SyncResult<String> {
        if self.0.is_empty() {
            Err(SyncError::Auth("no bearer token configured".to_string()))
        } else {
            Ok(self.0.clone())
        }
    }
}

/// Default lower bound for full calendar scans.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Drain `list_events` pages into a complete snapshot, checking the cancel
/// flag between pages.
pub async fn fetch_all_events<C: CalendarApi>(
    calendar: &C,
    calendar_id: &str,
    time_min: DateTime<Utc>,
    time_max: Option<DateTime<Utc>>,
    cancel: &CancelFlag,
) -> SyncResult<Vec<CalendarEvent>> {
    let mut events = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        cancel.check()?;
        let page = calendar
            .list_events(calendar_id, time_min, time_max, page_token.as_deref())
            .await?;
        events.extend(page.items);

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(events)
}
