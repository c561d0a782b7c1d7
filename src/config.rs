//! Evaluation configuration
//!
//! Loaded from a JSON file or string. Every field has a default, so an empty
//! object is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{Logger, Severity};

/// Rows materialized per raw-scan window unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Knobs for compiling and evaluating predicate trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Maximum rows per raw-scan window
    pub batch_size: usize,
    /// Allow index-only and hybrid strategies
    pub use_index: bool,
    /// Treat an explicit JSON `null` at a path as present
    pub null_is_present: bool,
    /// Reuse results per (operator, range) within one query
    pub cache_results: bool,
    pub log_level: Severity,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            use_index: true,
            null_is_present: false,
            cache_results: true,
            log_level: Severity::Info,
        }
    }
}

impl EvalConfig {
    /// Raw scan only
    pub fn without_index() -> Self {
        Self {
            use_index: false,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_null_is_present(mut self, null_is_present: bool) -> Self {
        self.null_is_present = null_is_present;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EvalConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Install `log_level` as the process-wide minimum severity
    pub fn apply_log_level(&self) {
        Logger::set_min_severity(self.log_level);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".into()));
        }
        Ok(())
    }
}
