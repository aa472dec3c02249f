//! Flag registry
//!
//! [`FeatureFlags`] owns every flag, the deprecation list and the usage
//! metrics. All state sits behind one lock: mutations take it exclusively,
//! queries share it, so no caller ever observes a half-applied update.
//!
//! Unknown names are never an error. Queries answer `false` and mutations
//! do nothing, which keeps the decision path total for callers.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::FlagsConfig;
use crate::error::{ConfigError, FlagResult};
use crate::flag::{ExperimentMetrics, Flag};
use crate::metrics::{UsageRecord, UsageSnapshot, UsageTracker};
use crate::persistence::PersistedState;

#[derive(Debug, Default)]
struct RegistryState {
    flags: HashMap<String, Flag>,
    deprecated: Vec<String>,
    usage: UsageTracker,
}

/// Registry of named feature flags
///
/// Share it across threads as `Arc<FeatureFlags>`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct FeatureFlags {
    state: RwLock<RegistryState>,
}

impl FeatureFlags {
    /// Build a registry from a validated configuration
    ///
    /// Features with a rollout percentage become percentage flags, other
    /// features boolean flags. Experiments become experimental flags.
    pub fn new(config: FlagsConfig) -> Self {
        let mut flags = HashMap::with_capacity(config.features.len() + config.experiments.len());

        for (name, settings) in config.features {
            let flag = match settings.rollout_percentage {
                Some(percentage) => Flag::percentage(name.clone(), percentage),
                None => Flag::boolean(name.clone()),
            }
            .with_enabled(settings.enabled)
            .with_shadow(settings.shadow_mode);
            flags.insert(name, flag);
        }

        for (name, settings) in config.experiments {
            let flag = Flag::experimental(name.clone(), settings.compare_results)
                .with_enabled(settings.enabled);
            flags.insert(name, flag);
        }

        info!(flag_count = flags.len(), "Feature flag registry initialized");

        Self {
            state: RwLock::new(RegistryState {
                flags,
                ..RegistryState::default()
            }),
        }
    }

    /// Validate a configuration document and build a registry from it
    pub fn from_value(config: &Value) -> Result<Self, ConfigError> {
        FlagsConfig::from_value(config).map(Self::new)
    }

    /// Load a `.json` or `.toml` configuration file and build a registry
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        FlagsConfig::from_file(path).map(Self::new)
    }

    // ------------------------------------------------------------------
    // Enabled state
    // ------------------------------------------------------------------

    pub fn is_enabled(&self, name: &str) -> bool {
        self.state
            .read()
            .flags
            .get(name)
            .is_some_and(|flag| flag.enabled)
    }

    pub fn enable(&self, name: &str) {
        self.set_enabled(name, true);
    }

    pub fn disable(&self, name: &str) {
        self.set_enabled(name, false);
    }

    fn set_enabled(&self, name: &str, enabled: bool) {
        match self.state.write().flags.get_mut(name) {
            Some(flag) => {
                flag.enabled = enabled;
                debug!(flag = %name, enabled, "Flag state changed");
            }
            None => debug!(flag = %name, "Ignoring state change for unknown flag"),
        }
    }

    /// Decide whether `name` is on for `identifier`
    ///
    /// Percentage flags are evaluated against their current percentage on
    /// every call; other kinds answer like [`is_enabled`](Self::is_enabled).
    pub fn should_enable(&self, name: &str, identifier: &str) -> bool {
        self.state
            .read()
            .flags
            .get(name)
            .is_some_and(|flag| flag.should_enable(identifier))
    }

    // ------------------------------------------------------------------
    // Shadow mode
    // ------------------------------------------------------------------

    pub fn is_shadow_enabled(&self, name: &str) -> bool {
        self.state
            .read()
            .flags
            .get(name)
            .is_some_and(|flag| flag.shadow_enabled)
    }

    pub fn enable_shadow(&self, name: &str) {
        self.set_shadow(name, true);
    }

    pub fn disable_shadow(&self, name: &str) {
        self.set_shadow(name, false);
    }

    fn set_shadow(&self, name: &str, shadow_enabled: bool) {
        match self.state.write().flags.get_mut(name) {
            Some(flag) => {
                flag.shadow_enabled = shadow_enabled;
                debug!(flag = %name, shadow_enabled, "Shadow mode changed");
            }
            None => debug!(flag = %name, "Ignoring shadow change for unknown flag"),
        }
    }

    /// Log a comparison between production and shadow results
    ///
    /// Only experimental flags with `compare_results` on and shadow mode
    /// enabled record anything. Returns whether the comparison was recorded.
    pub fn log_comparison(&self, name: &str, old_result: &Value, new_result: &Value) -> bool {
        self.state
            .write()
            .flags
            .get_mut(name)
            .is_some_and(|flag| flag.log_comparison(old_result, new_result))
    }

    /// Run `candidate` in shadow of `production`
    ///
    /// The candidate only runs while shadow mode is enabled for `name`; its
    /// result is compared against production and then discarded. The
    /// production value is always what comes back.
    pub fn shadow<T, F>(&self, name: &str, production: T, candidate: F) -> T
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        if !self.is_shadow_enabled(name) {
            return production;
        }

        // The candidate runs without the lock held so it may query flags itself.
        let shadow_result = candidate();

        match (
            serde_json::to_value(&production),
            serde_json::to_value(&shadow_result),
        ) {
            (Ok(old), Ok(new)) => {
                self.log_comparison(name, &old, &new);
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(flag = %name, error = %e, "Could not serialize shadow comparison");
            }
        }

        production
    }

    /// Metrics of an experimental flag
    pub fn experiment_metrics(&self, name: &str) -> Option<ExperimentMetrics> {
        self.state
            .read()
            .flags
            .get(name)
            .and_then(|flag| flag.experiment_metrics().cloned())
    }

    // ------------------------------------------------------------------
    // Rollout
    // ------------------------------------------------------------------

    /// Change the rollout percentage of a percentage flag
    ///
    /// Other kinds and unknown names are left untouched. The new value is
    /// clamped into `[0, 100]` and applies from the next decision on.
    pub fn set_rollout_percentage(&self, name: &str, percentage: f64) {
        let mut state = self.state.write();
        match state.flags.get_mut(name).map(|flag| flag.set_rollout_percentage(percentage)) {
            Some(true) => debug!(flag = %name, percentage, "Rollout percentage changed"),
            Some(false) => debug!(flag = %name, "Ignoring rollout change for non-percentage flag"),
            None => debug!(flag = %name, "Ignoring rollout change for unknown flag"),
        }
    }

    /// Current rollout percentage of a percentage flag
    pub fn rollout_percentage(&self, name: &str) -> Option<f64> {
        self.state
            .read()
            .flags
            .get(name)
            .and_then(Flag::rollout_percentage)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create (or replace) a disabled experimental flag with zeroed metrics
    pub fn add_experiment(&self, name: &str) {
        let replaced = self
            .state
            .write()
            .flags
            .insert(name.to_string(), Flag::experimental(name, false))
            .is_some();
        debug!(flag = %name, replaced, "Experiment added");
    }

    /// Turn an experiment into a plain boolean feature
    ///
    /// Keeps `enabled`; drops shadow state and experiment metrics. Flags of
    /// any other kind are left as they are.
    pub fn convert_to_feature(&self, name: &str) {
        let mut state = self.state.write();
        let Some(feature) = state.flags.get(name).and_then(Flag::to_feature) else {
            debug!(flag = %name, "Not an experiment, nothing to convert");
            return;
        };

        info!(flag = %name, enabled = feature.enabled, "Experiment converted to feature");
        state.flags.insert(name.to_string(), feature);
    }

    /// Mark a flag for removal by the next cleanup
    pub fn add_deprecated_flag(&self, name: &str) {
        self.state.write().deprecated.push(name.to_string());
        debug!(flag = %name, "Flag marked as deprecated");
    }

    /// Names pending removal
    pub fn deprecated_flags(&self) -> Vec<String> {
        self.state.read().deprecated.clone()
    }

    /// Remove every deprecated flag that still exists
    ///
    /// Returns the names actually removed. The pending list is emptied
    /// either way.
    pub fn clean_deprecated_flags(&self) -> Vec<String> {
        let mut state = self.state.write();
        let pending = std::mem::take(&mut state.deprecated);

        let removed: Vec<String> = pending
            .into_iter()
            .filter(|name| state.flags.remove(name).is_some())
            .collect();

        if !removed.is_empty() {
            info!(removed = ?removed, "Deprecated flags removed");
        }
        removed
    }

    // ------------------------------------------------------------------
    // Usage metrics
    // ------------------------------------------------------------------

    /// Count one use of a feature
    ///
    /// The name does not need to be a live flag.
    pub fn record_usage(&self, name: &str, data: UsageRecord) {
        self.state.write().usage.record(name, &data);
    }

    /// Usage metrics for a name, `None` if nothing was recorded
    pub fn get_metrics(&self, name: &str) -> Option<UsageSnapshot> {
        self.state.read().usage.snapshot(name)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn has_flag(&self, name: &str) -> bool {
        self.state.read().flags.contains_key(name)
    }

    /// Snapshot of a single flag
    pub fn flag(&self, name: &str) -> Option<Flag> {
        self.state.read().flags.get(name).cloned()
    }

    /// Names of all flags, sorted
    pub fn flag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().flags.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.state.read().flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().flags.is_empty()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write every flag's state to `path`
    ///
    /// Flag kinds are not stored: experiments reload as boolean flags.
    pub fn save_state(&self, path: impl AsRef<Path>) -> FlagResult<()> {
        let snapshot = {
            let state = self.state.read();
            PersistedState::capture(state.flags.values())
        };
        snapshot.write(path.as_ref())?;

        info!(
            path = %path.as_ref().display(),
            flag_count = snapshot.features.len(),
            "Feature flag state saved"
        );
        Ok(())
    }

    /// Build a fresh registry from a state file written by [`save_state`](Self::save_state)
    pub fn load_state(path: impl AsRef<Path>) -> FlagResult<Self> {
        let state = PersistedState::read(path.as_ref())?;
        let flags = Self::new(state.into_config());

        info!(
            path = %path.as_ref().display(),
            flag_count = flags.len(),
            "Feature flag state loaded"
        );
        Ok(flags)
    }
}
