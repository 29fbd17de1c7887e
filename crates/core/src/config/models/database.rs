use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult, ConfigValidator, ValidationUtils};

/// 存储后端
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            url: "sqlite://bulkops.db?mode=rwc".to_string(),
            max_connections: 5,
            min_connections: 1,
            connection_timeout_seconds: 30,
            idle_timeout_seconds: 600,
        }
    }
}

impl ConfigValidator for DatabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.backend == StorageBackend::Memory {
            return Ok(());
        }

        ValidationUtils::validate_not_empty(&self.url, "database.url")?;
        if !self.url.starts_with("sqlite:") {
            return Err(ConfigError::Validation(
                "database.url must start with sqlite:".to_string(),
            ));
        }

        ValidationUtils::validate_positive(self.max_connections as u64, "database.max_connections")?;
        if self.min_connections > self.max_connections {
            return Err(ConfigError::Validation(
                "database.min_connections must be less than or equal to max_connections"
                    .to_string(),
            ));
        }

        ValidationUtils::validate_timeout_seconds(
            self.connection_timeout_seconds,
            "database.connection_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.idle_timeout_seconds,
            "database.idle_timeout_seconds",
        )?;

        Ok(())
    }
}
