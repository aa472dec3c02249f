// shadowflag - feature flag decisions for document processing pipelines
//
// Collaborators treat the registry as an opaque decision service: they ask
// `is_enabled`, `should_enable`, run new code through `shadow`, and report
// usage with `record_usage`.

// Re-export the decision core
pub use shadowflag_features::*;

// Re-export the member crate itself for fully qualified paths
pub use shadowflag_features;
