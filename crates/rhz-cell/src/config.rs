use std::path::Path;

use rhz_store::DEFAULT_MAX_ENTRY_BYTES;
use rhz_validate::{ValidationConfig, DEFAULT_MAX_TAG_BYTES};
use serde::{Deserialize, Serialize};

use crate::error::{CellError, CellResult};
use crate::retry::RetryPolicy;

/// Default capacity of the commit signal channel.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 256;

/// Configuration for a cell and the DHT it writes to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CellConfig {
    /// Largest entry accepted by the entry store, in bytes.
    pub max_entry_bytes: usize,
    /// Largest link tag accepted by validation, in bytes.
    pub max_tag_bytes: usize,
    /// Signals buffered per subscriber before the slowest one lags.
    pub signal_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            max_tag_bytes: DEFAULT_MAX_TAG_BYTES,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

impl CellConfig {
    pub fn from_toml_str(s: &str) -> CellResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| CellError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> CellResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> CellResult<String> {
        toml::to_string_pretty(self).map_err(|e| CellError::Config(e.to_string()))
    }

    /// The validation settings derived from this configuration.
    pub fn validation(&self) -> ValidationConfig {
        ValidationConfig {
            max_tag_bytes: self.max_tag_bytes,
        }
    }

    /// Reject settings a cell cannot run with.
    pub fn check(&self) -> CellResult<()> {
        if self.max_entry_bytes == 0 {
            return Err(CellError::Config("max_entry_bytes must be positive".into()));
        }
        if self.signal_capacity == 0 {
            return Err(CellError::Config("signal_capacity must be positive".into()));
        }
        self.retry.check()
    }
}
