use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::batch::{ActionType, BatchOutcome};
use super::sqlx_impls::string_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditSource {
    /// 批量操作调用
    Batch,
    /// 死信条目人工重试
    DlqRetry,
}

string_enum!(AuditSource {
    Batch => "batch",
    DlqRetry => "dlq_retry",
});

/// 审计记录，写入后不可修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub id: String,
    pub actor_id: String,
    pub action_type: ActionType,
    pub organization_id: String,
    pub campaign_id: Option<String>,
    pub source: AuditSource,
    pub affected_count: i64,
    pub succeeded_count: i64,
    pub failed_count: i64,
    pub dlq_count: i64,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor_id: &str,
        action_type: ActionType,
        organization_id: &str,
        campaign_id: Option<String>,
        source: AuditSource,
        outcome: BatchOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_id: actor_id.to_string(),
            action_type,
            organization_id: organization_id.to_string(),
            campaign_id,
            source,
            affected_count: i64::from(outcome.processed),
            succeeded_count: i64::from(outcome.succeeded),
            failed_count: i64::from(outcome.failed),
            dlq_count: i64::from(outcome.dlq_count),
            created_at: Utc::now(),
        }
    }
}
