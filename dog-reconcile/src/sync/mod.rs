pub mod menus;
pub mod routes;

use serde::Serialize;

use crate::error::ItemError;
use crate::gateway::UpsertOutcome;
use crate::types::EntityId;

pub use menus::MenuSynchronizer;
pub use routes::{RouteDiff, RouteSynchronizer, diff_routes};

/// Per-stage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub errors: usize,
}

impl SyncResult {
    /// True when the stage wrote nothing: no adds, updates or removals.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }

    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.added += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Counts plus the item errors collected by one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    pub result: SyncResult,
    pub errors: Vec<ItemError>,
}

impl StageReport {
    pub fn push_error(&mut self, error: ItemError) {
        self.result.errors += 1;
        self.errors.push(error);
    }
}

/// Ids present in `previous` but missing from `next`.
pub fn count_removed(previous: &[EntityId], next: &[EntityId]) -> usize {
    previous.iter().filter(|id| !next.contains(id)).count()
}
