use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult, ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationProviderKind {
    /// 只记录日志，不真正发送
    Log,
    /// 通过 HTTP 回调投递给外部通知服务
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub provider: NotificationProviderKind,
    #[serde(default)]
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            provider: NotificationProviderKind::Log,
            webhook_url: None,
            timeout_seconds: 10,
        }
    }
}

impl ConfigValidator for NotificationConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(
            self.timeout_seconds,
            "notification.timeout_seconds",
        )?;

        if self.provider == NotificationProviderKind::Webhook {
            let url = self.webhook_url.as_deref().unwrap_or_default();
            ValidationUtils::validate_not_empty(url, "notification.webhook_url")?;
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Validation(
                    "notification.webhook_url must be an http(s) URL".to_string(),
                ));
            }
        }
        Ok(())
    }
}
