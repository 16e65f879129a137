use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Tunables for a [`MessageRepository`](crate::MessageRepository).
///
/// Loadable from TOML; missing keys keep their defaults:
///
/// ```toml
/// optimistic_id_length = 12
/// max_optimistic_attempts = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Length of the random suffix after the optimistic prefix.
    pub optimistic_id_length: usize,
    /// Collisions tolerated before allocation gives up.
    pub max_optimistic_attempts: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            optimistic_id_length: 7,
            max_optimistic_attempts: 1024,
        }
    }
}

impl RepositoryConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RepositoryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Checks the values a repository relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.optimistic_id_length == 0 {
            return Err(ConfigError::Invalid("optimistic_id_length must be positive"));
        }
        if self.max_optimistic_attempts == 0 {
            return Err(ConfigError::Invalid("max_optimistic_attempts must be positive"));
        }
        Ok(())
    }
}
