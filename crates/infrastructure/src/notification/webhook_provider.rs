use std::time::Duration;

use async_trait::async_trait;
use bulkops_core::traits::{DeadlineExtensionNotice, InvitationNotice, NotificationProvider};
use bulkops_core::{BulkOpsError, BulkOpsResult, NotificationError};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

/// 投递给外部服务的通知报文
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WebhookEvent<'a> {
    Invitation(&'a InvitationNotice),
    DeadlineExtended(&'a DeadlineExtensionNotice),
}

/// HTTP 回调通知服务
///
/// 状态码映射：2xx 成功；408、429 和 5xx 以及网络错误视为临时错误；
/// 其余 4xx 视为永久错误。
#[derive(Clone)]
pub struct WebhookNotificationProvider {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotificationProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> BulkOpsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BulkOpsError::Configuration(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn deliver(&self, event: WebhookEvent<'_>) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(&event)
            .send()
            .await
            .map_err(|e| NotificationError::Transient(format!("通知请求失败: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!("通知投递成功: {}", status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("通知服务返回 {status}: {body}");
        warn!("{}", message);

        if is_transient_status(status) {
            Err(NotificationError::Transient(message))
        } else {
            Err(NotificationError::Permanent(message))
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[async_trait]
impl NotificationProvider for WebhookNotificationProvider {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotificationError> {
        self.deliver(WebhookEvent::Invitation(notice)).await
    }

    async fn notify_deadline_extension(
        &self,
        notice: &DeadlineExtensionNotice,
    ) -> Result<(), NotificationError> {
        self.deliver(WebhookEvent::DeadlineExtended(notice)).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
