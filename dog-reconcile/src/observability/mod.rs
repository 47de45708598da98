pub mod metrics;

use std::time::Duration;

use serde::Serialize;

use crate::sync::SyncResult;

pub use metrics::{LiveMetrics, MetricsSnapshot};

/// Reconciliation stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Tenant,
    Routes,
    Menus,
    Components,
    Users,
    Batch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Tenant => "tenant",
            Stage::Routes => "routes",
            Stage::Menus => "menus",
            Stage::Components => "components",
            Stage::Users => "users",
            Stage::Batch => "batch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Added,
    Updated,
    Unchanged,
    Removed,
    Errors,
    Succeeded,
    Failed,
}

/// Where the engine reports counters and stage durations.
///
/// Sinks must not influence reconciliation; [`NoopTelemetry`] is always a
/// valid substitute.
pub trait TelemetrySink: Send + Sync {
    fn increment(&self, metric: Metric, stage: Stage, by: u64);

    fn record_duration(&self, stage: Stage, elapsed: Duration);

    /// Emit the counts of one stage's [`SyncResult`].
    fn record_sync(&self, stage: Stage, result: &SyncResult) {
        let counts = [
            (Metric::Added, result.added),
            (Metric::Updated, result.updated),
            (Metric::Unchanged, result.unchanged),
            (Metric::Removed, result.removed),
            (Metric::Errors, result.errors),
        ];
        for (metric, n) in counts {
            if n > 0 {
                self.increment(metric, stage, n as u64);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn increment(&self, _metric: Metric, _stage: Stage, _by: u64) {}

    fn record_duration(&self, _stage: Stage, _elapsed: Duration) {}
}
