//! Engine configuration (spec §6).
//!
//! Reads `boardframe.toml`-style configuration: the handful of knobs the
//! engine is allowed to be parameterized by. Everything else (schema,
//! indexing, storage layout) belongs to the external collaborators named in
//! §6, not to this file.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Engine-wide configuration knobs named in spec §6.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Message gating threshold. `> 0` enables progress logging, `> 4`
    /// enables timing logging.
    #[serde(default)]
    pub verbosity: i32,

    /// When true, `groupby` results always include an implicit `count(*)`
    /// column even if the user did not request one.
    #[serde(default)]
    pub always_emit_counts: bool,

    /// When true, persist operations (`Board::backup`) fsync each column
    /// file. Has no effect on in-memory operators.
    #[serde(default)]
    pub sync_writes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            always_emit_counts: false,
            sync_writes: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.verbosity < 0 {
            return Err(ConfigError::Validation(
                "verbosity must be >= 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Progress-level logging is enabled.
    pub fn progress_enabled(&self) -> bool {
        self.verbosity > 0
    }

    /// Timing-level logging is enabled.
    pub fn timing_enabled(&self) -> bool {
        self.verbosity > 4
    }
}
