//! Optimizer configuration, read from the `[optimizer]` table of a TOML file.
//!
//! ```toml
//! [optimizer]
//! target = "legacy"
//! max_passes = 4
//! collect_remarks = false
//! ```
//!
//! Every key is optional; a missing table yields the defaults.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::shape::TargetGeneration;

const DEFAULT_MAX_PASSES: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Target generation for the compilation unit.
    pub target: TargetGeneration,
    /// Upper bound on passes before the driver gives up on a fixpoint.
    pub max_passes: usize,
    /// Keep missed specializations as remarks.
    pub collect_remarks: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            target: TargetGeneration::default(),
            max_passes: DEFAULT_MAX_PASSES,
            collect_remarks: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    optimizer: OptimizerConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => write!(f, "failed to read {path}: {message}"),
            ConfigError::Parse(message) => write!(f, "failed to parse optimizer config: {message}"),
            ConfigError::Invalid(message) => write!(f, "invalid optimizer config: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl OptimizerConfig {
    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<OptimizerConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_str(&content)
    }

    /// Parse a configuration from TOML text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<OptimizerConfig, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.optimizer.validate()?;
        Ok(file.optimizer)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_passes == 0 {
            return Err(ConfigError::Invalid("max_passes must be at least 1".into()));
        }
        Ok(())
    }
}
