use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{Metric, Stage, TelemetrySink};

/// Bounded history kept per stage.
const MAX_SAMPLES: usize = 1000;

/// In-process telemetry sink: counters per (metric, stage) plus a
/// rolling window of stage durations.
pub struct LiveMetrics {
    counters: RwLock<HashMap<(Metric, Stage), u64>>,
    durations: RwLock<HashMap<Stage, Vec<Duration>>>,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            durations: RwLock::new(HashMap::new()),
        }
    }

    pub fn counter(&self, metric: Metric, stage: Stage) -> u64 {
        self.counters.read().get(&(metric, stage)).copied().unwrap_or(0)
    }

    /// Sum of a metric across every stage.
    pub fn total(&self, metric: Metric) -> u64 {
        self.counters
            .read()
            .iter()
            .filter(|((m, _), _)| *m == metric)
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn samples(&self, stage: Stage) -> usize {
        self.durations.read().get(&stage).map_or(0, Vec::len)
    }

    pub fn average_duration(&self, stage: Stage) -> Option<Duration> {
        let durations = self.durations.read();
        let times = durations.get(&stage)?;
        if times.is_empty() {
            return None;
        }

        let total: Duration = times.iter().sum();
        Some(total / times.len() as u32)
    }

    pub fn percentile_duration(&self, stage: Stage, percentile: f64) -> Option<Duration> {
        let durations = self.durations.read();
        let times = durations.get(&stage)?;
        if times.is_empty() {
            return None;
        }

        let mut sorted = times.clone();
        sorted.sort();

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted.get(index).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            counters: self.counters.read().clone(),
        }
    }
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for LiveMetrics {
    fn increment(&self, metric: Metric, stage: Stage, by: u64) {
        *self.counters.write().entry((metric, stage)).or_insert(0) += by;
    }

    fn record_duration(&self, stage: Stage, elapsed: Duration) {
        let mut durations = self.durations.write();
        let times = durations.entry(stage).or_default();
        times.push(elapsed);

        if times.len() > MAX_SAMPLES {
            times.remove(0);
        }
    }
}

/// Counters at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub counters: HashMap<(Metric, Stage), u64>,
}

impl MetricsSnapshot {
    pub fn get(&self, metric: Metric, stage: Stage) -> u64 {
        self.counters.get(&(metric, stage)).copied().unwrap_or(0)
    }
}
