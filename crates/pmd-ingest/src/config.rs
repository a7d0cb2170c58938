//! Ingestion configuration
//!
//! Chunk sizes, the numeric tolerance used when comparing feed values with
//! the catalog, and the filename pattern that identifies PMD attachments.

use pmd_common::{PmdError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Default number of records per catalog lookup while preparing
pub const DEFAULT_PREPARE_CHUNK_SIZE: usize = 1000;

/// Default number of records per write batch while executing
pub const DEFAULT_APPLY_CHUNK_SIZE: usize = 1000;

/// Precision at which weights and volumes are compared
pub const DEFAULT_ROUNDING: f64 = 0.01;

/// Filenames matching this pattern are product master data feeds
pub const DEFAULT_FILENAME_PATTERN: &str = "^PMD";

fn default_chunk_size() -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(DEFAULT_PREPARE_CHUNK_SIZE - 1)
}

fn default_rounding() -> f64 {
    DEFAULT_ROUNDING
}

fn default_filename_pattern() -> String {
    DEFAULT_FILENAME_PATTERN.to_string()
}

/// Main ingestion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per catalog lookup during prepare (default: 1000)
    #[serde(default = "default_chunk_size")]
    pub prepare_chunk_size: NonZeroUsize,
    /// Records per write batch during execute (default: 1000)
    #[serde(default = "default_chunk_size")]
    pub apply_chunk_size: NonZeroUsize,
    /// Comparison precision for weight and volume (default: 0.01)
    #[serde(default = "default_rounding")]
    pub rounding: f64,
    /// Regular expression matched against attachment filenames (default: `^PMD`)
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            prepare_chunk_size: default_chunk_size(),
            apply_chunk_size: NonZeroUsize::MIN.saturating_add(DEFAULT_APPLY_CHUNK_SIZE - 1),
            rounding: DEFAULT_ROUNDING,
            filename_pattern: default_filename_pattern(),
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// - `PMD_PREPARE_CHUNK_SIZE`
    /// - `PMD_APPLY_CHUNK_SIZE`
    /// - `PMD_ROUNDING`
    /// - `PMD_FILENAME_PATTERN`
    ///
    /// Unset variables keep their defaults; set but invalid ones are errors.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(size) = env_parse::<NonZeroUsize>("PMD_PREPARE_CHUNK_SIZE")? {
            config.prepare_chunk_size = size;
        }
        if let Some(size) = env_parse::<NonZeroUsize>("PMD_APPLY_CHUNK_SIZE")? {
            config.apply_chunk_size = size;
        }
        if let Some(rounding) = env_parse::<f64>("PMD_ROUNDING")? {
            config.rounding = rounding;
        }
        if let Ok(pattern) = std::env::var("PMD_FILENAME_PATTERN") {
            config.filename_pattern = pattern;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !self.rounding.is_finite() || self.rounding <= 0.0 {
            return Err(PmdError::Config(format!(
                "rounding must be a positive number, got {}",
                self.rounding
            )));
        }

        regex::Regex::new(&self.filename_pattern).map_err(|e| {
            PmdError::Config(format!("invalid filename pattern '{}': {}", self.filename_pattern, e))
        })?;

        Ok(())
    }

    pub fn with_prepare_chunk_size(mut self, size: NonZeroUsize) -> Self {
        self.prepare_chunk_size = size;
        self
    }

    pub fn with_apply_chunk_size(mut self, size: NonZeroUsize) -> Self {
        self.apply_chunk_size = size;
        self
    }

    pub fn with_rounding(mut self, rounding: f64) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn with_filename_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filename_pattern = pattern.into();
        self
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PmdError::Config(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}
