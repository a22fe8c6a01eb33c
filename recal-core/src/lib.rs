//! Core types and reconciliation engine for recal.
//!
//! This crate holds everything the client crates and the CLI share:
//! - `LedgerRecord` / `CalendarEvent` and the partial-update `RecordPatch`
//! - the `LedgerStore` / `CalendarApi` / `CredentialProvider` traits that
//!   client crates implement
//! - duplicate detection, cross-source comparison, and the `Engine` that
//!   drives a reconciliation run

pub mod cancel;
pub mod clients;
pub mod compare;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod event;
pub mod outcome;
pub mod record;

pub use cancel::CancelFlag;
pub use clients::{CalendarApi, CredentialProvider, EventPage, LedgerStore, StaticToken};
pub use engine::{Engine, RunPace};
pub use error::{SyncError, SyncResult};
pub use event::{CalendarEvent, EventTime, NewEvent};
pub use outcome::{CleanupOutcome, RunOutcome};
pub use record::{LedgerRecord, RecordPatch};
