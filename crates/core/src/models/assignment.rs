use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::sqlx_impls::string_enum;

/// 评估分配：一名评估者对一次评估的完成义务
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: String,
    pub organization_id: String,
    pub campaign_id: String,
    pub session_id: String,
    pub evaluator_email: String,
    pub evaluator_name: Option<String>,
    pub assignment_type: AssignmentType,
    pub status: AssignmentStatus,
    pub invitation_token_hash: Option<String>,
    pub invitation_count: i32,
    pub deadline: DateTime<Utc>,
    pub last_invited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    #[serde(rename = "self")]
    SelfReview,
    Peer,
    Manager,
    Direct,
}

string_enum!(AssignmentType {
    SelfReview => "self",
    Peer => "peer",
    Manager => "manager",
    Direct => "direct",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Completed,
    Error,
    Cancelled,
}

string_enum!(AssignmentStatus {
    Pending => "pending",
    Completed => "completed",
    Error => "error",
    Cancelled => "cancelled",
});

impl AssignmentStatus {
    /// 已完成或已取消的分配不再接受批量操作
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Cancelled)
    }
}

impl Assignment {
    pub fn new(
        id: impl Into<String>,
        organization_id: impl Into<String>,
        campaign_id: impl Into<String>,
        evaluator_email: impl Into<String>,
        deadline: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            campaign_id: campaign_id.into(),
            session_id: String::new(),
            evaluator_email: evaluator_email.into(),
            evaluator_name: None,
            assignment_type: AssignmentType::Peer,
            status: AssignmentStatus::Pending,
            invitation_token_hash: None,
            invitation_count: 0,
            deadline,
            last_invited_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_type(mut self, assignment_type: AssignmentType) -> Self {
        self.assignment_type = assignment_type;
        self
    }

    pub fn with_status(mut self, status: AssignmentStatus) -> Self {
        self.status = status;
        self
    }

    /// 记录一次已发送的邀请
    pub fn record_invitation(&mut self, token_hash: impl Into<String>, now: DateTime<Utc>) {
        self.invitation_token_hash = Some(token_hash.into());
        self.invitation_count += 1;
        self.last_invited_at = Some(now);
        self.updated_at = now;
    }

    /// 在当前截止时间上顺延 `days` 天
    pub fn extended_deadline(&self, days: u32) -> DateTime<Utc> {
        self.deadline + chrono::Duration::days(i64::from(days))
    }

    pub fn set_deadline(&mut self, deadline: DateTime<Utc>, now: DateTime<Utc>) {
        self.deadline = deadline;
        self.updated_at = now;
    }

    /// 粗略校验收件人地址，明显无效的地址直接视为永久失败
    pub fn has_valid_recipient(&self) -> bool {
        let email = self.evaluator_email.trim();
        match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.contains(char::is_whitespace)
            }
            None => false,
        }
    }

    pub fn entity_description(&self) -> String {
        format!("评估分配 {} (组织: {})", self.id, self.organization_id)
    }
}

/// 邀请令牌只以 SHA-256 哈希形式存储
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// 生成新的邀请令牌，返回 (明文令牌, 哈希)
pub fn issue_invitation_token() -> (String, String) {
    let token = Uuid::new_v4().simple().to_string();
    let hash = hash_token(&token);
    (token, hash)
}
