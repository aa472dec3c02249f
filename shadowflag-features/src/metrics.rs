//! Registry-level usage metrics
//!
//! Usage is tracked per flag name regardless of kind, and independently of
//! whether the flag still exists. Averages are derived on read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Data reported by a collaborator for one use of a feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// How long the feature took, if measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl UsageRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a measured duration
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Attach a measured duration in milliseconds
    pub fn with_elapsed(self, elapsed: Duration) -> Self {
        self.with_duration(elapsed.as_secs_f64() * 1000.0)
    }
}

impl From<Duration> for UsageRecord {
    fn from(elapsed: Duration) -> Self {
        Self::new().with_elapsed(elapsed)
    }
}

/// Stored usage counters for one name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageMetrics {
    pub usage_count: u64,
    pub durations: Vec<f64>,
}

impl UsageMetrics {
    fn record(&mut self, data: &UsageRecord) {
        self.usage_count += 1;
        if let Some(duration) = data.duration {
            self.durations.push(duration);
        }
    }

    /// Arithmetic mean of the recorded durations
    pub fn average_duration(&self) -> Option<f64> {
        if self.durations.is_empty() {
            return None;
        }
        Some(self.durations.iter().sum::<f64>() / self.durations.len() as f64)
    }

    fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            usage_count: self.usage_count,
            durations: self.durations.clone(),
            average_duration: self.average_duration(),
        }
    }
}

/// Read-only view returned by `get_metrics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub usage_count: u64,
    pub durations: Vec<f64>,

    /// Present only when at least one duration was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_duration: Option<f64>,
}

/// Per-name usage counters
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    entries: HashMap<String, UsageMetrics>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one use of `name`, creating the entry on first use
    pub fn record(&mut self, name: &str, data: &UsageRecord) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .record(data);
    }

    /// Snapshot for `name`, `None` if nothing was ever recorded
    pub fn snapshot(&self, name: &str) -> Option<UsageSnapshot> {
        self.entries.get(name).map(UsageMetrics::snapshot)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
