use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult, ConfigValidator, ValidationUtils};
use crate::models::Plan;

/// 重试退避配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// 首次重试前的等待时间（毫秒）
    pub initial_delay_ms: u64,
    /// 指数退避倍数
    pub backoff_factor: f64,
    /// 单次等待的上限（毫秒）
    pub max_delay_ms: u64,
    /// 单个分配的最大尝试次数
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            backoff_factor: 2.0,
            max_delay_ms: 32_000,
            max_retries: 5,
        }
    }
}

impl ConfigValidator for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_positive(self.max_retries as u64, "pipeline.retry.max_retries")?;
        if self.backoff_factor < 1.0 {
            return Err(ConfigError::Validation(
                "pipeline.retry.backoff_factor must be at least 1.0".to_string(),
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Validation(
                "pipeline.retry.initial_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// 幂等冷却窗口的上限：一年
pub const MAX_IDEMPOTENCY_COOLDOWN_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 幂等冷却窗口（秒），默认24小时
    pub idempotency_cooldown_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idempotency_cooldown_seconds: 24 * 60 * 60,
            retry: RetryConfig::default(),
        }
    }
}

impl ConfigValidator for PipelineConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_positive(
            self.idempotency_cooldown_seconds,
            "pipeline.idempotency_cooldown_seconds",
        )?;
        if self.idempotency_cooldown_seconds > MAX_IDEMPOTENCY_COOLDOWN_SECONDS {
            return Err(ConfigError::Validation(format!(
                "pipeline.idempotency_cooldown_seconds must not exceed {MAX_IDEMPOTENCY_COOLDOWN_SECONDS}"
            )));
        }
        self.retry.validate()
    }
}

/// 各套餐每个窗口允许的通知数量
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanQuotas {
    pub free: u64,
    pub starter: u64,
    pub professional: u64,
    pub enterprise: u64,
}

impl PlanQuotas {
    pub fn limit_for(&self, plan: Plan) -> u64 {
        match plan {
            Plan::Free => self.free,
            Plan::Starter => self.starter,
            Plan::Professional => self.professional,
            Plan::Enterprise => self.enterprise,
        }
    }
}

impl Default for PlanQuotas {
    fn default() -> Self {
        Self {
            free: 50,
            starter: 500,
            professional: 2_000,
            enterprise: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 配额窗口长度（秒）
    pub window_seconds: u64,
    pub plans: PlanQuotas,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: 3600,
            plans: PlanQuotas::default(),
        }
    }
}

impl ConfigValidator for RateLimitConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_positive(self.window_seconds, "rate_limit.window_seconds")
    }
}

/// 死信队列配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DlqConfig {
    /// 保留天数，为空表示永久保留
    #[serde(default)]
    pub retention_days: Option<u32>,
}

impl ConfigValidator for DlqConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.retention_days == Some(0) {
            return Err(ConfigError::Validation(
                "dlq.retention_days must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// 过期数据清理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 3600,
        }
    }
}

impl ConfigValidator for MaintenanceConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.enabled {
            ValidationUtils::validate_positive(
                self.interval_seconds,
                "maintenance.interval_seconds",
            )?;
        }
        Ok(())
    }
}
