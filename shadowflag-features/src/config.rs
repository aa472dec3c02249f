//! Flag configuration
//!
//! Parses and validates the configuration document a registry is built from:
//!
//! ```text
//! features:    { <name>: { enabled?, rollout_percentage?, shadow_mode? } }
//! experiments: { <name>: { enabled?, compare_results? } }
//! ```
//!
//! Validation walks the whole document and reports every problem it finds.
//! Unknown keys inside an entry are ignored; a `null` value counts as absent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

const FEATURES: &str = "features";
const EXPERIMENTS: &str = "experiments";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }

    /// Detect the format from a path's extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat("no file extension".to_string()))?;

        Self::from_extension(ext).ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))
    }

    /// Parse file content into the shared JSON value model
    pub fn parse(&self, content: &str) -> Result<Value, ConfigError> {
        match self {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::Parse(format!("JSON parse error: {}", e))),
            FileFormat::Toml => {
                let toml_value: toml::Value = toml::from_str(content)
                    .map_err(|e| ConfigError::Parse(format!("TOML parse error: {}", e)))?;

                serde_json::to_value(toml_value).map_err(|e| {
                    ConfigError::Parse(format!("TOML to JSON conversion error: {}", e))
                })
            }
        }
    }
}

/// Settings for one entry of the `features` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Present for percentage rollout flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_percentage: Option<f64>,

    #[serde(default)]
    pub shadow_mode: bool,
}

/// Settings for one entry of the `experiments` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Log and count shadow comparisons
    #[serde(default)]
    pub compare_results: bool,
}

/// Validated flag configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagsConfig {
    #[serde(default)]
    pub features: BTreeMap<String, FeatureSettings>,

    #[serde(default)]
    pub experiments: BTreeMap<String, ExperimentSettings>,
}

impl FlagsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature entry
    pub fn with_feature(mut self, name: impl Into<String>, settings: FeatureSettings) -> Self {
        self.features.insert(name.into(), settings);
        self
    }

    /// Add an experiment entry
    pub fn with_experiment(
        mut self,
        name: impl Into<String>,
        settings: ExperimentSettings,
    ) -> Self {
        self.experiments.insert(name.into(), settings);
        self
    }

    /// Validate a configuration document
    pub fn from_value(config: &Value) -> Result<Self, ConfigError> {
        let root = config.as_object().ok_or(ConfigError::NotAnObject)?;

        let mut problems = Vec::new();
        let mut parsed = Self::new();

        if let Some(entries) = section(root, FEATURES, &mut problems) {
            for (name, settings) in entries {
                if let Some(feature) = parse_feature(name, settings, &mut problems) {
                    parsed.features.insert(name.clone(), feature);
                }
            }
        }

        if let Some(entries) = section(root, EXPERIMENTS, &mut problems) {
            for (name, settings) in entries {
                if let Some(experiment) = parse_experiment(name, settings, &mut problems) {
                    parsed.experiments.insert(name.clone(), experiment);
                }
            }
        }

        match ConfigError::from_problems(problems) {
            Some(err) => Err(err),
            None => Ok(parsed),
        }
    }

    /// Parse and validate a JSON string
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_value(&FileFormat::Json.parse(content)?)
    }

    /// Parse and validate a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_value(&FileFormat::Toml.parse(content)?)
    }

    /// Load a `.json` or `.toml` configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;

        Self::from_value(&format.parse(&content)?)
    }
}

fn section<'a>(
    root: &'a Map<String, Value>,
    name: &str,
    problems: &mut Vec<ConfigError>,
) -> Option<&'a Map<String, Value>> {
    match present(root.get(name))? {
        Value::Object(entries) => Some(entries),
        _ => {
            problems.push(ConfigError::SectionNotObject {
                section: name.to_string(),
            });
            None
        }
    }
}

fn parse_feature(
    name: &str,
    settings: &Value,
    problems: &mut Vec<ConfigError>,
) -> Option<FeatureSettings> {
    let settings = entry(FEATURES, name, settings, problems)?;
    let before = problems.len();

    let enabled = boolean(FEATURES, name, settings, "enabled", problems);
    let shadow_mode = boolean(FEATURES, name, settings, "shadow_mode", problems);
    let rollout_percentage = match present(settings.get("rollout_percentage")) {
        None => None,
        Some(value) => match value.as_f64() {
            Some(pct) if (0.0..=100.0).contains(&pct) => Some(pct),
            _ => {
                problems.push(ConfigError::InvalidPercentage {
                    name: name.to_string(),
                    value: value.to_string(),
                });
                None
            }
        },
    };

    (problems.len() == before).then_some(FeatureSettings {
        enabled,
        rollout_percentage,
        shadow_mode,
    })
}

fn parse_experiment(
    name: &str,
    settings: &Value,
    problems: &mut Vec<ConfigError>,
) -> Option<ExperimentSettings> {
    let settings = entry(EXPERIMENTS, name, settings, problems)?;
    let before = problems.len();

    let enabled = boolean(EXPERIMENTS, name, settings, "enabled", problems);
    let compare_results = boolean(EXPERIMENTS, name, settings, "compare_results", problems);

    (problems.len() == before).then_some(ExperimentSettings {
        enabled,
        compare_results,
    })
}

fn entry<'a>(
    section: &str,
    name: &str,
    settings: &'a Value,
    problems: &mut Vec<ConfigError>,
) -> Option<&'a Map<String, Value>> {
    match settings {
        Value::Object(map) => Some(map),
        _ => {
            problems.push(ConfigError::EntryNotObject {
                section: section.to_string(),
                name: name.to_string(),
            });
            None
        }
    }
}

fn boolean(
    section: &str,
    name: &str,
    settings: &Map<String, Value>,
    field: &str,
    problems: &mut Vec<ConfigError>,
) -> bool {
    match present(settings.get(field)) {
        None => false,
        Some(Value::Bool(value)) => *value,
        Some(_) => {
            problems.push(ConfigError::NotBoolean {
                section: section.to_string(),
                name: name.to_string(),
                field: field.to_string(),
            });
            false
        }
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document() {
        let config = FlagsConfig::from_value(&json!({})).unwrap();
        assert!(config.features.is_empty());
        assert!(config.experiments.is_empty());
    }

    #[test]
    fn test_parse_sections() {
        let config = FlagsConfig::from_value(&json!({
            "features": {
                "enhanced_email": {
                    "enabled": false,
                    "rollout_percentage": 0,
                    "shadow_mode": true,
                    "log_level": "debug"
                },
                "ai_categorization": {
                    "enabled": true,
                    "confidence_threshold": 0.9
                }
            },
            "experiments": {
                "new_pdf_processor": {
                    "enabled": false,
                    "sample_size": 100,
                    "compare_results": true
                }
            }
        }))
        .unwrap();

        let email = &config.features["enhanced_email"];
        assert!(!email.enabled);
        assert!(email.shadow_mode);
        assert_eq!(email.rollout_percentage, Some(0.0));

        let ai = &config.features["ai_categorization"];
        assert!(ai.enabled);
        assert_eq!(ai.rollout_percentage, None);

        assert!(config.experiments["new_pdf_processor"].compare_results);
    }

    #[test]
    fn test_root_must_be_object() {
        let err = FlagsConfig::from_value(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ConfigError::NotAnObject));
    }

    #[test]
    fn test_section_must_be_object() {
        let err = FlagsConfig::from_value(&json!({"features": ["a"]})).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::SectionNotObject { ref section } if section == "features"
        ));
    }

    #[test]
    fn test_enabled_must_be_boolean() {
        let err = FlagsConfig::from_value(&json!({
            "features": {"test": {"enabled": "not_a_boolean"}}
        }))
        .unwrap_err();

        assert_eq!(err.to_string(), "enabled flag for test must be boolean");
    }

    #[test]
    fn test_reports_every_problem() {
        let err = FlagsConfig::from_value(&json!({
            "features": {
                "a": {"enabled": 1},
                "b": {"rollout_percentage": 101},
                "c": "on"
            },
            "experiments": 7
        }))
        .unwrap_err();

        assert_eq!(err.problems().len(), 4);
    }

    #[test]
    fn test_null_is_absent() {
        let config = FlagsConfig::from_value(&json!({
            "features": {"a": {"enabled": null, "rollout_percentage": null}},
            "experiments": null
        }))
        .unwrap();

        assert!(!config.features["a"].enabled);
        assert_eq!(config.features["a"].rollout_percentage, None);
    }

    #[test]
    fn test_percentage_bounds_inclusive() {
        let config = FlagsConfig::from_value(&json!({
            "features": {"low": {"rollout_percentage": 0}, "high": {"rollout_percentage": 100}}
        }))
        .unwrap();
        assert_eq!(config.features["low"].rollout_percentage, Some(0.0));
        assert_eq!(config.features["high"].rollout_percentage, Some(100.0));

        assert!(
            FlagsConfig::from_value(&json!({"features": {"neg": {"rollout_percentage": -1}}}))
                .is_err()
        );
        assert!(
            FlagsConfig::from_value(&json!({"features": {"s": {"rollout_percentage": "50"}}}))
                .is_err()
        );
    }

    #[test]
    fn test_toml_matches_json() {
        let from_toml = FlagsConfig::from_toml_str(
            r#"
            [features.new_parser]
            enabled = true
            rollout_percentage = 10

            [experiments.ocr_v2]
            compare_results = true
            "#,
        )
        .unwrap();

        let from_json = FlagsConfig::from_json_str(
            r#"{
                "features": {"new_parser": {"enabled": true, "rollout_percentage": 10}},
                "experiments": {"ocr_v2": {"compare_results": true}}
            }"#,
        )
        .unwrap();

        assert_eq!(from_toml, from_json);
    }

    #[test]
    fn test_file_format_detection() {
        assert_eq!(
            FileFormat::from_path(Path::new("flags.JSON")).unwrap(),
            FileFormat::Json
        );
        assert_eq!(
            FileFormat::from_path(Path::new("flags.toml")).unwrap(),
            FileFormat::Toml
        );
        assert!(matches!(
            FileFormat::from_path(Path::new("flags.yaml")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_path(Path::new("flags")).is_err());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(
            FlagsConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
