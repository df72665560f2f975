//! Engine configuration, persisted as TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{ModelError, ModelResult};

/// How unique pre-checks are protected against concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueGuard {
    /// Watch every key a pre-check reads and retry the batch if one changes.
    #[default]
    Optimistic,
    /// Check then write with nothing in between. Two concurrent writers can
    /// both claim the same unique value.
    Unguarded,
}

/// Tunables of a [`Db`](crate::engine::Db).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub unique_guard: UniqueGuard,
    /// Retries of a discarded batch before giving up with `Contention`.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unique_guard: UniqueGuard::Optimistic,
            max_retries: 8,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> ModelResult<Self> {
        toml::from_str(s).map_err(|e| ModelError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> ModelResult<String> {
        toml::to_string(self).map_err(|e| ModelError::Config(e.to_string()))
    }

    /// Read a config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn is_guarded(&self) -> bool {
        self.unique_guard == UniqueGuard::Optimistic
    }
}
