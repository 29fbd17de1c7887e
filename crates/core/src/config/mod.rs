//! 配置管理
//!
//! 配置从 TOML 文件加载，并允许通过 `BULKOPS_` 前缀的环境变量覆盖。
//! 每个配置段实现 [`ConfigValidator`]，加载完成后统一校验。

pub mod models;

pub use models::*;

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Configuration(err.to_string())
    }
}

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a timeout is reasonable
    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> ConfigResult<()> {
        if timeout_seconds == 0 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if timeout_seconds > 3600 {
            return Err(ConfigError::Validation(format!(
                "{field_name} cannot exceed 3600 seconds"
            )));
        }
        Ok(())
    }

    /// Validate that a count is positive
    pub fn validate_positive(value: u64, field_name: &str) -> ConfigResult<()> {
        if value == 0 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        Ok(())
    }

    /// Validate that a value is one of the allowed options
    pub fn validate_one_of(value: &str, allowed: &[&str], field_name: &str) -> ConfigResult<()> {
        if !allowed.contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be one of {allowed:?}, got '{value}'"
            )));
        }
        Ok(())
    }
}
