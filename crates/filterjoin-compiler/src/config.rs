//! Compiler configuration.
//!
//! Sources, lowest priority first: built-in defaults, a JSON config file,
//! then the environment (`FILTERJOIN_SENTINEL_INDEX`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SENTINEL_INDEX_ENV: &str = "FILTERJOIN_SENTINEL_INDEX";

/// Index that degenerate joins point at when a relation resolves to no
/// index at all. It only has to exist; the attached query matches nothing.
pub const DEFAULT_SENTINEL_INDEX: &str = ".filterjoin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub sentinel_index: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            sentinel_index: DEFAULT_SENTINEL_INDEX.to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(index) = lookup(SENTINEL_INDEX_ENV) {
            self.sentinel_index = index;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sentinel_index.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sentinel_index must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
