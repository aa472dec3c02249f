//! Feature Flag Core
//!
//! Defines feature flags, their kinds, and shadow-mode comparison logging.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::rollout;

/// Feature flag
///
/// Every kind shares the two independent switches `enabled` and
/// `shadow_enabled`; kind-specific data lives in [`FlagKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    /// Flag name, unique within a registry
    pub name: String,

    /// Whether the flag is on for production traffic
    pub enabled: bool,

    /// Whether the shadow path runs alongside production
    pub shadow_enabled: bool,

    /// Kind-specific payload
    pub kind: FlagKind,
}

/// Flag kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlagKind {
    /// Plain on/off flag
    Boolean,

    /// Per-identifier rollout, `percentage` in `[0, 100]`
    Percentage { percentage: f64 },

    /// Experiment with its own comparison metrics
    Experimental(Experiment),
}

/// Experiment payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Whether comparisons are logged and counted
    pub log_results: bool,

    /// Accumulated comparison metrics
    pub metrics: ExperimentMetrics,
}

/// Metrics accumulated by an experimental flag
///
/// Counters only grow until the flag is replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetrics {
    /// Comparisons recorded
    pub usage_count: u64,

    /// Comparisons whose new result carried an error
    pub error_count: u64,

    /// Durations reported by the new implementation, in recording order
    pub durations: Vec<f64>,
}

impl Flag {
    /// Create a disabled boolean flag
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            shadow_enabled: false,
            kind: FlagKind::Boolean,
        }
    }

    /// Create a disabled percentage rollout flag
    ///
    /// The percentage is clamped into `[0, 100]`.
    pub fn percentage(name: impl Into<String>, percentage: f64) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            shadow_enabled: false,
            kind: FlagKind::Percentage {
                percentage: rollout::clamp_percentage(percentage),
            },
        }
    }

    /// Create a disabled experimental flag with zeroed metrics
    pub fn experimental(name: impl Into<String>, log_results: bool) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            shadow_enabled: false,
            kind: FlagKind::Experimental(Experiment {
                log_results,
                metrics: ExperimentMetrics::default(),
            }),
        }
    }

    /// Set enabled state
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set shadow state
    pub fn with_shadow(mut self, shadow_enabled: bool) -> Self {
        self.shadow_enabled = shadow_enabled;
        self
    }

    /// Rollout percentage, only for percentage flags
    pub fn rollout_percentage(&self) -> Option<f64> {
        match self.kind {
            FlagKind::Percentage { percentage } => Some(percentage),
            _ => None,
        }
    }

    /// Update the rollout percentage
    ///
    /// Returns `false` without changing anything when this is not a
    /// percentage flag.
    pub fn set_rollout_percentage(&mut self, value: f64) -> bool {
        match &mut self.kind {
            FlagKind::Percentage { percentage } => {
                *percentage = rollout::clamp_percentage(value);
                true
            }
            _ => false,
        }
    }

    /// Decide for a single identifier
    ///
    /// Percentage flags bucket the identifier; other kinds ignore it and
    /// answer with `enabled`.
    pub fn should_enable(&self, identifier: &str) -> bool {
        match self.kind {
            FlagKind::Percentage { percentage } => {
                rollout::evaluate(&self.name, identifier, percentage)
            }
            FlagKind::Boolean | FlagKind::Experimental(_) => self.enabled,
        }
    }

    pub fn is_experimental(&self) -> bool {
        matches!(self.kind, FlagKind::Experimental(_))
    }

    /// Experiment metrics, only for experimental flags
    pub fn experiment_metrics(&self) -> Option<&ExperimentMetrics> {
        match &self.kind {
            FlagKind::Experimental(experiment) => Some(&experiment.metrics),
            _ => None,
        }
    }

    /// Replace an experimental flag with a boolean one keeping only `enabled`
    ///
    /// Shadow state and experiment metrics are dropped. Returns `None` for
    /// any other kind.
    pub fn to_feature(&self) -> Option<Flag> {
        match self.kind {
            FlagKind::Experimental(_) => {
                Some(Flag::boolean(self.name.clone()).with_enabled(self.enabled))
            }
            _ => None,
        }
    }

    /// Log a comparison between the production and shadow results
    ///
    /// Only experimental flags with comparison logging on and shadow mode
    /// enabled record anything. Returns whether the comparison was recorded.
    /// A numeric `duration` in `new_result` is kept; a non-null `error`
    /// counts as a failed comparison.
    pub fn log_comparison(&mut self, old_result: &Value, new_result: &Value) -> bool {
        let shadow_enabled = self.shadow_enabled;
        let FlagKind::Experimental(experiment) = &mut self.kind else {
            return false;
        };
        if !experiment.log_results || !shadow_enabled {
            return false;
        }

        info!(flag = %self.name, "Comparing results for {}", self.name);
        info!(flag = %self.name, old = %old_result, "Old result: {}", old_result);
        info!(flag = %self.name, new = %new_result, "New result: {}", new_result);

        let metrics = &mut experiment.metrics;
        metrics.usage_count += 1;
        if let Some(duration) = new_result.get("duration").and_then(Value::as_f64) {
            metrics.durations.push(duration);
        }
        if new_result.get("error").is_some_and(|e| !e.is_null()) {
            metrics.error_count += 1;
        }

        true
    }
}
