use serde::{Deserialize, Serialize};

/// Default cap on link tag length.
pub const DEFAULT_MAX_TAG_BYTES: usize = 1000;

/// Configuration for the validation pipeline. Every proposal runs the full
/// pipeline; there is no bypass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Maximum link tag length in bytes.
    pub max_tag_bytes: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_tag_bytes: DEFAULT_MAX_TAG_BYTES,
        }
    }
}
