use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::NotificationError;

/// 邀请通知
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvitationNotice {
    pub organization_id: String,
    pub assignment_id: String,
    pub campaign_id: String,
    pub recipient: String,
    pub recipient_name: Option<String>,
    /// 明文邀请令牌，只在通知中出现，不落库
    pub token: String,
    pub deadline: DateTime<Utc>,
    pub custom_message: Option<String>,
}

/// 截止时间延期通知
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadlineExtensionNotice {
    pub organization_id: String,
    pub assignment_id: String,
    pub campaign_id: String,
    pub recipient: String,
    pub recipient_name: Option<String>,
    pub new_deadline: DateTime<Utc>,
    pub extension_days: u32,
    pub custom_message: Option<String>,
}

/// 通知服务接口
///
/// 管道只区分两类失败：临时错误会按退避策略重试，永久错误直接进入死信队列。
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotificationError>;

    async fn notify_deadline_extension(
        &self,
        notice: &DeadlineExtensionNotice,
    ) -> Result<(), NotificationError>;

    fn name(&self) -> &str;
}
