//! 通知服务实现
//!
//! `LoggingNotificationProvider` 只写日志，适合本地运行；
//! `WebhookNotificationProvider` 把通知以 JSON 形式投递给外部 HTTP 服务。

pub mod logging_provider;
pub mod webhook_provider;

use std::sync::Arc;
use std::time::Duration;

use bulkops_core::config::{NotificationConfig, NotificationProviderKind};
use bulkops_core::traits::NotificationProvider;
use bulkops_core::{BulkOpsError, BulkOpsResult};

pub use logging_provider::LoggingNotificationProvider;
pub use webhook_provider::WebhookNotificationProvider;

/// 按配置创建通知服务
pub fn create_notification_provider(
    config: &NotificationConfig,
) -> BulkOpsResult<Arc<dyn NotificationProvider>> {
    match config.provider {
        NotificationProviderKind::Log => Ok(Arc::new(LoggingNotificationProvider::new())),
        NotificationProviderKind::Webhook => {
            let url = config.webhook_url.clone().ok_or_else(|| {
                BulkOpsError::Configuration("webhook 通知需要配置 webhook_url".to_string())
            })?;
            let provider = WebhookNotificationProvider::new(
                url,
                Duration::from_secs(config.timeout_seconds),
            )?;
            Ok(Arc::new(provider))
        }
    }
}
