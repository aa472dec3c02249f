//! Persisted registry state
//!
//! The state document stores, per flag, only `enabled`, `shadow_enabled`
//! and `percentage` (`null` for non-percentage flags):
//!
//! ```json
//! { "features": { "new_parser": { "enabled": true, "shadow_enabled": false, "percentage": 10.0 } } }
//! ```
//!
//! Flag kinds are not stored, so experiments come back as boolean flags and
//! lose their metrics. Usage metrics and the deprecation list are not
//! persisted either.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{FeatureSettings, FlagsConfig};
use crate::error::{FlagError, FlagResult};
use crate::flag::Flag;

/// One flag in the state document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedFlag {
    pub enabled: bool,
    pub shadow_enabled: bool,
    #[serde(default)]
    pub percentage: Option<f64>,
}

/// The state document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub features: BTreeMap<String, PersistedFlag>,
}

impl PersistedState {
    /// Snapshot a set of flags
    pub fn capture<'a>(flags: impl IntoIterator<Item = &'a Flag>) -> Self {
        let features = flags
            .into_iter()
            .map(|flag| {
                (
                    flag.name.clone(),
                    PersistedFlag {
                        enabled: flag.enabled,
                        shadow_enabled: flag.shadow_enabled,
                        percentage: flag.rollout_percentage(),
                    },
                )
            })
            .collect();

        Self { features }
    }

    /// Rebuild the configuration a registry is constructed from
    pub fn into_config(self) -> FlagsConfig {
        let features = self
            .features
            .into_iter()
            .map(|(name, flag)| {
                (
                    name,
                    FeatureSettings {
                        enabled: flag.enabled,
                        rollout_percentage: flag.percentage,
                        shadow_mode: flag.shadow_enabled,
                    },
                )
            })
            .collect();

        FlagsConfig {
            features,
            experiments: BTreeMap::new(),
        }
    }

    /// Parse a state document
    pub fn from_json(content: &str) -> FlagResult<Self> {
        let state: Self = serde_json::from_str(content)?;
        state.validate()?;
        Ok(state)
    }

    fn validate(&self) -> FlagResult<()> {
        for (name, flag) in &self.features {
            if let Some(percentage) = flag.percentage
                && !(0.0..=100.0).contains(&percentage)
            {
                return Err(FlagError::invalid_state(format!(
                    "percentage for {} must be between 0 and 100, got {}",
                    name, percentage
                )));
            }
        }
        Ok(())
    }

    /// Read and validate a state file
    pub fn read(path: &Path) -> FlagResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the state file
    ///
    /// Content goes to a sibling temporary file first and is renamed over
    /// `path`, so readers never see a truncated document.
    pub fn write(&self, path: &Path) -> FlagResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = temp_path(path);

        if let Err(e) = write_and_replace(&tmp, path, json.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn write_and_replace(tmp: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(content)?;
    file.sync_all()?;
    fs::rename(tmp, path)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_capture_drops_kind() {
        let flags = [
            Flag::boolean("plain").with_enabled(true),
            Flag::percentage("gradual", 25.0).with_shadow(true),
            Flag::experimental("exp", true).with_enabled(true).with_shadow(true),
        ];

        let state = PersistedState::capture(flags.iter());

        assert_eq!(state.features["plain"].percentage, None);
        assert_eq!(state.features["gradual"].percentage, Some(25.0));
        assert!(state.features["gradual"].shadow_enabled);
        assert_eq!(
            state.features["exp"],
            PersistedFlag {
                enabled: true,
                shadow_enabled: true,
                percentage: None,
            }
        );
    }

    #[test]
    fn test_document_shape() {
        let state = PersistedState::capture([Flag::boolean("plain")].iter());
        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "features": {
                    "plain": {"enabled": false, "shadow_enabled": false, "percentage": null}
                }
            })
        );
    }

    #[test]
    fn test_into_config() {
        let state = PersistedState::from_json(
            r#"{"features": {"a": {"enabled": true, "shadow_enabled": true, "percentage": 40}}}"#,
        )
        .unwrap();

        let config = state.into_config();
        assert_eq!(
            config.features["a"],
            FeatureSettings {
                enabled: true,
                rollout_percentage: Some(40.0),
                shadow_mode: true,
            }
        );
        assert!(config.experiments.is_empty());
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(matches!(
            PersistedState::from_json("not json"),
            Err(FlagError::Serialization(_))
        ));
        assert!(PersistedState::from_json("{}").is_err());
        assert!(
            PersistedState::from_json(r#"{"features": {"a": {"enabled": "yes", "shadow_enabled": false}}}"#)
                .is_err()
        );
        assert!(matches!(
            PersistedState::from_json(
                r#"{"features": {"a": {"enabled": true, "shadow_enabled": false, "percentage": 120}}}"#
            ),
            Err(FlagError::InvalidState(_))
        ));
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feature_flags.json");
        let state = PersistedState::capture([Flag::percentage("p", 12.5)].iter());

        state.write(&path).unwrap();

        assert_eq!(PersistedState::read(&path).unwrap(), state);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = PersistedState::read(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, FlagError::Io(_)));
    }

    #[test]
    fn test_temp_path_is_sibling() {
        assert_eq!(
            temp_path(Path::new("/var/lib/flags/state.json")),
            PathBuf::from("/var/lib/flags/state.json.tmp")
        );
    }
}
