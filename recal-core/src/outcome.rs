//! Per-run result reporting.

use serde::Serialize;

/// Result of one reconciliation run, in processing order. Ephemeral; owned
/// by the caller of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// Records for which a new calendar event was created.
    pub added: Vec<String>,
    /// Records whose calendar event was replaced (or detached for
    /// recreation, in full-sync mode).
    pub updated: Vec<String>,
    /// Records whose calendar event already matched.
    pub unchanged: Vec<String>,
    /// Records that could not be processed this run.
    pub failed: Vec<String>,
}

impl RunOutcome {
    pub fn total(&self) -> usize {
        self.added.len() + self.updated.len() + self.unchanged.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} added, {} updated, {} unchanged, {} failed",
            self.added.len(),
            self.updated.len(),
            self.unchanged.len(),
            self.failed.len()
        )
    }
}

/// Result of a duplicate cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    /// Calendar event ids removed as duplicates.
    pub removed: Vec<String>,
    /// Ledger record ids detached because their event was removed.
    pub reset: Vec<String>,
    /// Calendar event ids that could not be removed.
    pub failed: Vec<String>,
}

impl CleanupOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} duplicates removed, {} records reset, {} failed",
            self.removed.len(),
            self.reset.len(),
            self.failed.len()
        )
    }
}
