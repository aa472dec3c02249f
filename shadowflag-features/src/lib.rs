//! Feature Flags for shadowflag
//!
//! Decision core for feature flags: runtime toggles, percentage-based
//! gradual rollout, shadow-mode execution of unreleased code paths, the
//! experiment → feature → deprecated → removed lifecycle, usage metrics and
//! persisted state.
//!
//! # Features
//!
//! - **Boolean flags** - Toggle features at runtime
//! - **Gradual rollout** - Deterministic per-identifier percentage rollout
//! - **Shadow mode** - Run new code next to production without affecting results
//! - **Experiments** - Comparison metrics, then promotion to a regular feature
//! - **Persistence** - Save and reload flag state as JSON
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//! use shadowflag_features::*;
//!
//! let flags = FeatureFlags::from_value(&json!({
//!     "features": {
//!         "new_parser": { "enabled": false, "rollout_percentage": 25 }
//!     }
//! }))
//! .unwrap();
//!
//! assert!(!flags.is_enabled("new_parser"));
//! flags.enable("new_parser");
//! assert!(flags.is_enabled("new_parser"));
//!
//! // Same answer for the same document, every time
//! let first = flags.should_enable("new_parser", "doc-42");
//! assert_eq!(flags.should_enable("new_parser", "doc-42"), first);
//! ```
//!
//! # Shadow Mode
//!
//! ```
//! use serde_json::json;
//! use shadowflag_features::*;
//!
//! let flags = FeatureFlags::from_value(&json!({
//!     "experiments": { "ocr_v2": { "compare_results": true } }
//! }))
//! .unwrap();
//! flags.enable_shadow("ocr_v2");
//!
//! // The production value is always returned; the candidate is only compared.
//! let text = flags.shadow("ocr_v2", "old text".to_string(), || "new text".to_string());
//! assert_eq!(text, "old text");
//! assert_eq!(flags.experiment_metrics("ocr_v2").unwrap().usage_count, 1);
//! ```
//!
//! # Lifecycle
//!
//! ```
//! use shadowflag_features::*;
//!
//! let flags = FeatureFlags::new(FlagsConfig::new());
//! flags.add_experiment("smart_filing");
//! flags.enable("smart_filing");
//! flags.convert_to_feature("smart_filing");
//! assert!(flags.is_enabled("smart_filing"));
//!
//! flags.add_deprecated_flag("smart_filing");
//! assert_eq!(flags.clean_deprecated_flags(), vec!["smart_filing".to_string()]);
//! assert!(!flags.has_flag("smart_filing"));
//! ```

pub mod config;
pub mod error;
pub mod flag;
pub mod metrics;
pub mod persistence;
pub mod registry;
pub mod rollout;

pub use config::{ExperimentSettings, FeatureSettings, FileFormat, FlagsConfig};
pub use error::{ConfigError, FlagError, FlagResult};
pub use flag::{Experiment, ExperimentMetrics, Flag, FlagKind};
pub use metrics::{UsageRecord, UsageSnapshot};
pub use persistence::{PersistedFlag, PersistedState};
pub use registry::FeatureFlags;
