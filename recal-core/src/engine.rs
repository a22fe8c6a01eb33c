//! The reconciliation engine.
//!
//! One run walks the unprocessed ledger records strictly sequentially and
//! decides, per record, whether a matching calendar event exists, whether it
//! drifted, and which corrective mutation to apply. Per record:
//!
//! ```text
//! PENDING -> LOCKED -> {CREATED | UPDATED | UNCHANGED | FAILED} -> UNLOCKED
//! ```
//!
//! A record is locked (`processed = true`) before any calendar mutation so a
//! crash mid-run leaves it visibly touched rather than silently reprocessed.
//! The settling step runs for every record; it clears the lock for records
//! that ended FAILED, so they are retried on a later run but never left
//! permanently locked. Successful records keep `processed = true` as their
//! durable sync marker.

use std::collections::{HashMap, HashSet};
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::cancel::CancelFlag;
use crate::clients::{CalendarApi, LedgerStore, epoch, fetch_all_events};
use crate::compare::is_different;
use crate::config::EngineConfig;
use crate::dedup::{calendar_duplicates, find_matching_event, ledger_duplicates};
use crate::error::{SyncError, SyncResult};
use crate::event::{CalendarEvent, NewEvent};
use crate::outcome::{CleanupOutcome, RunOutcome};
use crate::record::{LedgerRecord, RecordPatch};

/// Pacing of an incremental run. Bulk runs insert the inter-record delay to
/// respect upstream rate limits; incremental per-event runs do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPace {
    Bulk,
    Incremental,
}

/// Terminal state of one record within a run.
enum Disposition {
    Created(String),
    Updated(String),
    Unchanged,
    Failed(SyncError),
}

/// Reconciles ledger records with calendar events through the two client
/// traits. Assumes at most one concurrent caller per calendar id; overlap
/// prevention lives in the driver.
pub struct Engine<L, C> {
    ledger: L,
    calendar: C,
    config: EngineConfig,
    cancel: CancelFlag,
}

impl<L: LedgerStore, C: CalendarApi> Engine<L, C> {
    pub fn new(ledger: L, calendar: C, config: EngineConfig, cancel: CancelFlag) -> Self {
        Engine {
            ledger,
            calendar,
            config,
            cancel,
        }
    }

    /// Incremental run: process every unprocessed record for the calendar.
    ///
    /// Per-record failures are recorded in the outcome and the loop
    /// continues; failures before the loop (fetches, credentials) abort the
    /// run with zero mutations applied. A cancelled run returns the partial
    /// outcome; mutations already applied stay committed.
    pub async fn run(
        &self,
        calendar_id: &str,
        calendar_key: Option<&str>,
        pace: RunPace,
    ) -> SyncResult<RunOutcome> {
        self.cancel.check()?;
        let records = self.ledger.fetch_unprocessed(calendar_key).await?;
        let events =
            fetch_all_events(&self.calendar, calendar_id, epoch(), None, &self.cancel).await?;

        info!(
            records = records.len(),
            events = events.len(),
            calendar = calendar_id,
            "starting reconciliation run"
        );

        let duplicates = ledger_duplicates(&records);
        let mut outcome = RunOutcome::default();

        for (idx, record) in records.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("cancellation requested, stopping run early");
                break;
            }

            if duplicates.contains(&record.id) {
                warn!(record = %record.id, "duplicate among unprocessed records, not syncing this pass");
                if let Err(err) = self.ledger.unlock(&record.id).await {
                    warn!(record = %record.id, error = %err, "failed to mark duplicate unprocessed");
                }
                continue;
            }

            if idx > 0 && pace == RunPace::Bulk && self.config.bulk_delay_secs > 0 {
                sleep(StdDuration::from_secs(self.config.bulk_delay_secs)).await;
            }

            let disposition = self.handle_record(calendar_id, record, &events).await;
            let failed = matches!(disposition, Disposition::Failed(_));
            self.settle(&record.id, failed).await;

            match disposition {
                Disposition::Created(event_id) => {
                    info!(record = %record.id, event = %event_id, "created calendar event");
                    outcome.added.push(record.id.clone());
                }
                Disposition::Updated(event_id) => {
                    info!(record = %record.id, event = %event_id, "replaced calendar event");
                    outcome.updated.push(record.id.clone());
                }
                Disposition::Unchanged => {
                    outcome.unchanged.push(record.id.clone());
                }
                Disposition::Failed(err) => {
                    outcome.failed.push(record.id.clone());
                    if matches!(err, SyncError::Cancelled) {
                        warn!(record = %record.id, "record interrupted by cancellation");
                        break;
                    }
                    if err.is_run_fatal() {
                        error!(error = %err, "run-level failure, aborting");
                        return Err(err);
                    }
                    warn!(record = %record.id, error = %err, "record failed");
                }
            }
        }

        info!(summary = %outcome.summary(), "reconciliation run finished");
        Ok(outcome)
    }

    /// Full-sync: authoritative diff of all records (including processed
    /// ones) against current calendar state, to repair external drift.
    ///
    /// Read-mostly and idempotent: externally-deleted or drifted events only
    /// detach their record; recreation happens on the next incremental run.
    /// Records without a `google_event_id` are left untouched here.
    pub async fn full_sync(&self, calendar_id: &str) -> SyncResult<RunOutcome> {
        self.cancel.check()?;
        let records = self.ledger.fetch_all().await?;
        let events =
            fetch_all_events(&self.calendar, calendar_id, epoch(), None, &self.cancel).await?;
        let by_id: HashMap<&str, &CalendarEvent> =
            events.iter().map(|event| (event.id.as_str(), event)).collect();

        info!(
            records = records.len(),
            events = events.len(),
            calendar = calendar_id,
            "starting full sync"
        );

        let mut outcome = RunOutcome::default();

        for record in &records {
            if self.cancel.is_cancelled() {
                warn!("cancellation requested, stopping full sync early");
                break;
            }

            let Some(event_id) = record.google_event_id.as_deref() else {
                continue;
            };

            let result = match by_id.get(event_id) {
                None => {
                    info!(record = %record.id, event = event_id, "event deleted externally, detaching record");
                    self.ledger
                        .update_record(&record.id, &RecordPatch::reset())
                        .await
                        .map(|()| true)
                }
                Some(event) if is_different(record, event, self.config.compare_description) => {
                    info!(record = %record.id, event = event_id, "event drifted, removing for recreation");
                    self.detach_stale(calendar_id, &record.id, event_id).await
                }
                Some(_) => Ok(false),
            };

            match result {
                Ok(true) => outcome.updated.push(record.id.clone()),
                Ok(false) => outcome.unchanged.push(record.id.clone()),
                Err(err) if err.is_run_fatal() => {
                    outcome.failed.push(record.id.clone());
                    if matches!(err, SyncError::Cancelled) {
                        break;
                    }
                    error!(error = %err, "run-level failure, aborting full sync");
                    return Err(err);
                }
                Err(err) => {
                    warn!(record = %record.id, error = %err, "full-sync repair failed");
                    outcome.failed.push(record.id.clone());
                }
            }
        }

        info!(summary = %outcome.summary(), "full sync finished");
        Ok(outcome)
    }

    /// Duplicate cleanup pass over the calendar. Runs strictly after
    /// creation passes in a cycle; already-deleted events count as removed.
    pub async fn remove_duplicates(&self, calendar_id: &str) -> SyncResult<CleanupOutcome> {
        self.cancel.check()?;
        let records = self.ledger.fetch_all().await?;
        let referenced: HashSet<String> = records
            .iter()
            .filter_map(|record| record.google_event_id.clone())
            .collect();
        let owner_of: HashMap<&str, &str> = records
            .iter()
            .filter_map(|record| {
                record
                    .google_event_id
                    .as_deref()
                    .map(|event_id| (event_id, record.id.as_str()))
            })
            .collect();

        let events =
            fetch_all_events(&self.calendar, calendar_id, epoch(), None, &self.cancel).await?;
        let duplicates = calendar_duplicates(&events, &referenced);

        info!(
            events = events.len(),
            duplicates = duplicates.len(),
            calendar = calendar_id,
            "starting duplicate cleanup"
        );

        let mut outcome = CleanupOutcome::default();

        for event in events.iter().filter(|event| duplicates.contains(&event.id)) {
            if self.cancel.is_cancelled() {
                warn!("cancellation requested, stopping cleanup early");
                break;
            }

            match self.calendar.delete_event(calendar_id, &event.id).await {
                Ok(()) | Err(SyncError::NotFound(_)) => {
                    info!(event = %event.id, "removed duplicate event");
                    outcome.removed.push(event.id.clone());
                    if let Some(record_id) = owner_of.get(event.id.as_str()).copied() {
                        match self
                            .ledger
                            .update_record(record_id, &RecordPatch::reset())
                            .await
                        {
                            Ok(()) => outcome.reset.push(record_id.to_string()),
                            Err(err) => {
                                // full-sync will repair the dangling reference
                                warn!(record = record_id, error = %err, "failed to detach record");
                            }
                        }
                    }
                }
                Err(err) if err.is_run_fatal() => {
                    outcome.failed.push(event.id.clone());
                    if matches!(err, SyncError::Cancelled) {
                        break;
                    }
                    error!(error = %err, "run-level failure, aborting cleanup");
                    return Err(err);
                }
                Err(err) => {
                    warn!(event = %event.id, error = %err, "failed to remove duplicate");
                    outcome.failed.push(event.id.clone());
                }
            }
        }

        info!(summary = %outcome.summary(), "duplicate cleanup finished");
        Ok(outcome)
    }

    /// Lock, then sync one record; every error becomes a FAILED disposition.
    async fn handle_record(
        &self,
        calendar_id: &str,
        record: &LedgerRecord,
        snapshot: &[CalendarEvent],
    ) -> Disposition {
        if let Err(err) = validate_record(record) {
            return Disposition::Failed(err);
        }

        // Best-effort: a failed lock write is logged, not fatal.
        if let Err(err) = self.ledger.lock(&record.id).await {
            warn!(record = %record.id, error = %err, "failed to lock record, continuing");
        }

        match self.sync_record(calendar_id, record, snapshot).await {
            Ok(disposition) => disposition,
            Err(err) => Disposition::Failed(err),
        }
    }

    async fn sync_record(
        &self,
        calendar_id: &str,
        record: &LedgerRecord,
        snapshot: &[CalendarEvent],
    ) -> SyncResult<Disposition> {
        self.cancel.check()?;
        let window = Duration::minutes(self.config.match_window_minutes);

        let Some(candidate) = find_matching_event(snapshot, record, window) else {
            let event_id = self.create_for(calendar_id, record).await?;
            return Ok(Disposition::Created(event_id));
        };

        // The snapshot may be stale; re-fetch the match before comparing.
        let Some(event) = self.calendar.get_event(calendar_id, &candidate.id).await? else {
            let event_id = self.create_for(calendar_id, record).await?;
            return Ok(Disposition::Created(event_id));
        };

        if is_different(record, &event, self.config.compare_description) {
            // Delete-before-create: never merge in place on the create path.
            self.cancel.check()?;
            self.calendar.delete_event(calendar_id, &event.id).await?;
            let event_id = self
                .calendar
                .create_event(calendar_id, &NewEvent::from_record(record))
                .await?;
            self.ledger
                .update_record(&record.id, &RecordPatch::synced(event_id.clone()))
                .await?;
            Ok(Disposition::Updated(event_id))
        } else {
            if record.google_event_id.as_deref() != Some(event.id.as_str()) {
                self.ledger
                    .update_record(&record.id, &RecordPatch::synced(event.id.clone()))
                    .await?;
            }
            Ok(Disposition::Unchanged)
        }
    }

    async fn create_for(&self, calendar_id: &str, record: &LedgerRecord) -> SyncResult<String> {
        self.cancel.check()?;
        let event_id = self
            .calendar
            .create_event(calendar_id, &NewEvent::from_record(record))
            .await?;
        self.ledger
            .update_record(&record.id, &RecordPatch::synced(event_id.clone()))
            .await?;
        Ok(event_id)
    }

    /// Remove a drifted event and detach its record for recreation.
    async fn detach_stale(
        &self,
        calendar_id: &str,
        record_id: &str,
        event_id: &str,
    ) -> SyncResult<bool> {
        match self.calendar.delete_event(calendar_id, event_id).await {
            Ok(()) | Err(SyncError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        self.ledger
            .update_record(record_id, &RecordPatch::reset())
            .await?;
        Ok(true)
    }

    /// Settling step, run for every record regardless of outcome: wait out
    /// the ledger's eventual consistency, then clear the lock of a FAILED
    /// record so it is retried later instead of staying wedged.
    async fn settle(&self, record_id: &str, failed: bool) {
        if self.config.settle_secs > 0 {
            sleep(StdDuration::from_secs(self.config.settle_secs)).await;
        }
        if failed {
            if let Err(err) = self.ledger.unlock(record_id).await {
                warn!(record = record_id, error = %err, "failed to clear lock");
            }
        }
    }
}

fn validate_record(record: &LedgerRecord) -> SyncResult<()> {
    if record.title.trim().is_empty() {
        return Err(SyncError::Validation(format!(
            "record {} has no title",
            record.id
        )));
    }
    if record.end < record.start {
        return Err(SyncError::Validation(format!(
            "record {} ends before it starts",
            record.id
        )));
    }
    Ok(())
}
