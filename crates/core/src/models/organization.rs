use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sqlx_impls::string_enum;

/// 组织订阅套餐，决定通知配额
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Starter,
    Professional,
    Enterprise,
}

string_enum!(Plan {
    Free => "free",
    Starter => "starter",
    Professional => "professional",
    Enterprise => "enterprise",
});

/// 组织级功能开关
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureFlags {
    #[serde(default = "enabled")]
    pub bulk_actions: bool,
    #[serde(default = "enabled")]
    pub deadline_extension: bool,
    #[serde(default)]
    pub custom_messages: bool,
}

fn enabled() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            bulk_actions: true,
            deadline_extension: true,
            custom_messages: false,
        }
    }
}

/// 组织配置对象，每个批次读取一次并显式向下传递
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganizationSettings {
    pub organization_id: String,
    pub plan: Plan,
    pub feature_flags: FeatureFlags,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationSettings {
    /// 未登记的组织使用默认套餐和默认开关
    pub fn defaults_for(organization_id: &str) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            plan: Plan::default(),
            feature_flags: FeatureFlags::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_flags(mut self, feature_flags: FeatureFlags) -> Self {
        self.feature_flags = feature_flags;
        self
    }
}

/// 配额快照：窗口上限与当前用量
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub limit: u64,
    pub used: u64,
    pub window_start: DateTime<Utc>,
}

impl QuotaSnapshot {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn allows(&self, requested: u64) -> bool {
        self.used.saturating_add(requested) <= self.limit
    }
}
