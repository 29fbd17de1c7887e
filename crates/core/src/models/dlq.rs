use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::batch::{ActionType, BulkActionParams};
use super::sqlx_impls::string_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DlqStatus {
    PendingRetry,
    /// 人工重试进行中，其他重试请求会被拒绝
    Retrying,
    /// 人工重试仍失败，需要人工介入
    Failed,
}

string_enum!(DlqStatus {
    PendingRetry => "pending_retry",
    Retrying => "retrying",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Permanent,
}

string_enum!(FailureKind {
    Transient => "transient",
    Permanent => "permanent",
});

/// 进入死信队列前的失败描述
#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem {
    pub organization_id: String,
    pub assignment_id: String,
    pub action_type: ActionType,
    pub params: BulkActionParams,
    pub last_error: String,
    pub error_kind: FailureKind,
    pub retry_count: u32,
    pub batch_key: Option<String>,
}

/// 死信条目：重试耗尽或永久失败的单个分配
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DlqEntry {
    pub id: String,
    pub organization_id: String,
    pub assignment_id: String,
    pub action_type: ActionType,
    pub params: BulkActionParams,
    pub last_error: String,
    pub error_kind: FailureKind,
    pub retry_count: i32,
    pub status: DlqStatus,
    pub batch_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DlqEntry {
    pub fn from_failed_item(item: FailedItem, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            organization_id: item.organization_id,
            assignment_id: item.assignment_id,
            action_type: item.action_type,
            params: item.params,
            last_error: item.last_error,
            error_kind: item.error_kind,
            retry_count: item.retry_count as i32,
            status: DlqStatus::PendingRetry,
            batch_key: item.batch_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.status == DlqStatus::PendingRetry
    }

    /// 人工重试再次失败后标记为终态
    pub fn mark_failed(&mut self, last_error: String, attempts: u32, now: DateTime<Utc>) {
        self.status = DlqStatus::Failed;
        self.last_error = last_error;
        self.retry_count += attempts as i32;
        self.updated_at = now;
    }
}
