use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::batch::{ActionType, BatchOutcome};
use super::sqlx_impls::string_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// 已占用，批次执行中
    InProgress,
    /// 执行完毕，结果已记录
    Completed,
}

string_enum!(IdempotencyStatus {
    InProgress => "in_progress",
    Completed => "completed",
});

/// 幂等记录：在冷却窗口内占用一个批次指纹
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdempotencyRecord {
    pub key: String,
    pub organization_id: String,
    pub action_type: ActionType,
    pub target_count: i64,
    pub status: IdempotencyStatus,
    pub outcome: Option<BatchOutcome>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn provisional(
        key: String,
        organization_id: &str,
        action_type: ActionType,
        target_count: usize,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Self {
        Self {
            key,
            organization_id: organization_id.to_string(),
            action_type,
            target_count: target_count as i64,
            status: IdempotencyStatus::InProgress,
            outcome: None,
            created_at: now,
            expires_at: now + cooldown,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// 由操作类型、组织和排序去重后的目标ID计算稳定的批次指纹
///
/// 目标顺序和重复项不影响结果。
pub fn compute_idempotency_key(
    action_type: ActionType,
    organization_id: &str,
    target_ids: &[String],
) -> String {
    let mut sorted: Vec<&str> = target_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(action_type.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(organization_id.as_bytes());
    hasher.update(b"\n");
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(b"\x1f");
    }
    hex::encode(hasher.finalize())
}
