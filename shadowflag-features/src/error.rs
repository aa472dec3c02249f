//! Error types for feature flags

use thiserror::Error;

/// Result type for feature flag operations
pub type FlagResult<T> = Result<T, FlagError>;

/// Configuration errors raised while building a registry.
///
/// Construction is all-or-nothing: any of these aborts it and no registry
/// is produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document root is not an object
    #[error("Config must be an object")]
    NotAnObject,

    /// A `features` or `experiments` section is not an object
    #[error("{section} must be an object")]
    SectionNotObject { section: String },

    /// A flag entry inside a section is not an object
    #[error("settings for {name} in {section} must be an object")]
    EntryNotObject { section: String, name: String },

    /// A boolean setting (`enabled`, `shadow_mode`, `compare_results`) has another type
    #[error("{field} flag for {name} must be boolean")]
    NotBoolean {
        section: String,
        name: String,
        field: String,
    },

    /// `rollout_percentage` is not a number in `[0, 100]`
    #[error("rollout_percentage for {name} must be a number between 0 and 100, got {value}")]
    InvalidPercentage { name: String, value: String },

    /// The configuration file extension is not supported
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// The configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Several problems were found in one document
    #[error("{} configuration problems: {}", .0.len(), join_problems(.0))]
    Multiple(Vec<ConfigError>),
}

impl ConfigError {
    /// Collapse a list of validation problems into a single error.
    ///
    /// Returns `None` when the list is empty.
    pub fn from_problems(mut problems: Vec<ConfigError>) -> Option<Self> {
        match problems.len() {
            0 => None,
            1 => problems.pop(),
            _ => Some(Self::Multiple(problems)),
        }
    }

    /// Every individual problem carried by this error
    pub fn problems(&self) -> Vec<&ConfigError> {
        match self {
            Self::Multiple(inner) => inner.iter().collect(),
            other => vec![other],
        }
    }
}

fn join_problems(problems: &[ConfigError]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Feature flag errors
#[derive(Debug, Error)]
pub enum FlagError {
    /// Invalid configuration document
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading or writing persisted state failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state is not valid JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted state is valid JSON but not a state document
    #[error("Invalid state document: {0}")]
    InvalidState(String),
}

impl FlagError {
    /// Create a new invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Check if this error came from configuration validation
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
