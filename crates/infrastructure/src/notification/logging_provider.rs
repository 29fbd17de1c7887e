use async_trait::async_trait;
use bulkops_core::traits::{DeadlineExtensionNotice, InvitationNotice, NotificationProvider};
use bulkops_core::NotificationError;
use tracing::info;

/// 只记录日志的通知服务，令牌不会写入日志
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationProvider;

impl LoggingNotificationProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationProvider for LoggingNotificationProvider {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotificationError> {
        info!(
            organization_id = %notice.organization_id,
            assignment_id = %notice.assignment_id,
            recipient = %notice.recipient,
            deadline = %notice.deadline,
            has_custom_message = notice.custom_message.is_some(),
            "发送评估邀请"
        );
        Ok(())
    }

    async fn notify_deadline_extension(
        &self,
        notice: &DeadlineExtensionNotice,
    ) -> Result<(), NotificationError> {
        info!(
            organization_id = %notice.organization_id,
            assignment_id = %notice.assignment_id,
            recipient = %notice.recipient,
            new_deadline = %notice.new_deadline,
            extension_days = notice.extension_days,
            "发送截止时间延期通知"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
