use serde::{Deserialize, Serialize};

use crate::config::{ConfigResult, ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
    pub request_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            cors_enabled: true,
            request_timeout_seconds: 300,
        }
    }
}

impl ConfigValidator for ApiConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.bind_address, "api.bind_address")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "api.request_timeout_seconds",
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_one_of(
            &self.log_level,
            &["trace", "debug", "info", "warn", "error"],
            "observability.log_level",
        )?;
        ValidationUtils::validate_one_of(
            &self.log_format,
            &["json", "pretty"],
            "observability.log_format",
        )?;
        Ok(())
    }
}
