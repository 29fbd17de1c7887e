use serde::{Deserialize, Serialize};

use super::sqlx_impls::string_enum;

/// 自定义消息的最大长度
pub const MAX_CUSTOM_MESSAGE_LEN: usize = 2000;
/// 单次延期允许的最大天数
pub const MAX_EXTENSION_DAYS: u32 = 365;

/// 批量操作类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ResendInvitation,
    ExtendDeadline,
}

string_enum!(ActionType {
    ResendInvitation => "resend_invitation",
    ExtendDeadline => "extend_deadline",
});

/// 批量操作的可选参数
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkActionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_days: Option<u32>,
}

/// 一次批量操作调用，不会被持久化，只通过审计记录留痕
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub action_type: ActionType,
    pub organization_id: String,
    pub target_ids: Vec<String>,
    pub actor_id: String,
    #[serde(default)]
    pub params: BulkActionParams,
}

impl BatchRequest {
    pub fn new(
        action_type: ActionType,
        organization_id: impl Into<String>,
        target_ids: Vec<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            organization_id: organization_id.into(),
            target_ids,
            actor_id: actor_id.into(),
            params: BulkActionParams::default(),
        }
    }

    pub fn with_params(mut self, params: BulkActionParams) -> Self {
        self.params = params;
        self
    }

    /// 去重后的目标列表，保留首次出现的顺序
    pub fn unique_targets(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.target_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

/// 批量执行结果的计数部分，同时写入幂等记录
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub dlq_count: u32,
}

/// 运维告警：基础设施层面的失败，不影响已生效的修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationalWarning {
    QuotaLookupFailed { error: String },
    DlqWriteFailed { assignment_id: String, error: String },
    AuditWriteFailed { error: String },
    DlqDeleteFailed { entry_id: String, error: String },
}

/// 调用方拿到的批量执行结果，部分成功是正常结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub dlq_count: u32,
    pub audit_record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<OperationalWarning>,
}

impl BatchResult {
    pub fn outcome(&self) -> BatchOutcome {
        BatchOutcome {
            processed: self.processed,
            succeeded: self.succeeded,
            failed: self.failed,
            dlq_count: self.dlq_count,
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, sent_to_dlq: bool) {
        self.processed += 1;
        self.failed += 1;
        if sent_to_dlq {
            self.dlq_count += 1;
        }
    }
}
