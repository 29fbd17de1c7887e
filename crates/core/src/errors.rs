use chrono::{DateTime, Utc};
use thiserror::Error;

/// 批量操作错误类型定义
#[derive(Debug, Error)]
pub enum BulkOpsError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("批量操作目标列表为空")]
    EmptyBatch,

    #[error("重复的批量操作: {key}，首次提交于 {first_seen_at}")]
    DuplicateBatch {
        key: String,
        first_seen_at: DateTime<Utc>,
    },

    #[error("组织 {organization_id} 超出配额: 上限 {limit}，已用 {used}，本次请求 {requested}")]
    RateLimitExceeded {
        organization_id: String,
        limit: u64,
        used: u64,
        requested: u64,
    },

    #[error("组织 {organization_id} 未启用功能: {feature}")]
    FeatureDisabled {
        organization_id: String,
        feature: String,
    },

    #[error("无效的批量操作参数: {0}")]
    InvalidParams(String),

    #[error("评估分配未找到: {id}")]
    AssignmentNotFound { id: String },

    #[error("评估分配 {id} 不存在或已结束，修改未写入")]
    AssignmentClosed { id: String },

    #[error("死信条目未找到: {id}")]
    DlqEntryNotFound { id: String },

    #[error("死信条目 {id} 当前状态不允许重试: {status}")]
    DlqEntryNotRetryable { id: String, status: String },

    #[error("通知服务错误: {0}")]
    Notification(#[from] NotificationError),

    #[error("配额服务错误: {0}")]
    Quota(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl BulkOpsError {
    /// 是否为派发前拒绝（调用方可见，无副作用）
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BulkOpsError::EmptyBatch
                | BulkOpsError::DuplicateBatch { .. }
                | BulkOpsError::RateLimitExceeded { .. }
                | BulkOpsError::FeatureDisabled { .. }
                | BulkOpsError::InvalidParams(_)
        )
    }
}

impl From<serde_json::Error> for BulkOpsError {
    fn from(err: serde_json::Error) -> Self {
        BulkOpsError::Serialization(err.to_string())
    }
}

/// 通知服务返回的两类错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    /// 可重试的错误，例如服务商限流、网络超时
    #[error("临时错误: {0}")]
    Transient(String),

    /// 不可重试的错误，例如收件人地址无效
    #[error("永久错误: {0}")]
    Permanent(String),
}

impl NotificationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, NotificationError::Transient(_))
    }
}

/// 单个目标执行失败的分类，决定重试还是直接进入死信队列
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Permanent(String),
}

impl ActionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ActionError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ActionError::Transient(message) | ActionError::Permanent(message) => message,
        }
    }
}

impl From<NotificationError> for ActionError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Transient(message) => {
                ActionError::Transient(format!("通知发送失败: {message}"))
            }
            NotificationError::Permanent(message) => {
                ActionError::Permanent(format!("通知发送失败: {message}"))
            }
        }
    }
}

impl From<BulkOpsError> for ActionError {
    /// 存储层错误按临时错误处理，找不到记录属于永久错误
    fn from(err: BulkOpsError) -> Self {
        match err {
            BulkOpsError::AssignmentNotFound { .. } | BulkOpsError::AssignmentClosed { .. } => {
                ActionError::Permanent(err.to_string())
            }
            BulkOpsError::Notification(inner) => inner.into(),
            other => ActionError::Transient(other.to_string()),
        }
    }
}

/// 统一的Result类型
pub type BulkOpsResult<T> = std::result::Result<T, BulkOpsError>;
