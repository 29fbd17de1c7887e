use std::sync::Arc;

use async_trait::async_trait;
use bulkops_core::config::RateLimitConfig;
use bulkops_core::models::QuotaSnapshot;
use bulkops_core::traits::{OrganizationRepository, QuotaService, UsageRepository};
use bulkops_core::{BulkOpsError, BulkOpsResult};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

/// 基于组织套餐的固定窗口配额服务
///
/// 配额上限由套餐决定，用量按 `window_seconds` 对齐的固定窗口累计。
/// 组织没有配置记录时按默认套餐计算。
pub struct PlanQuotaService {
    organization_repository: Arc<dyn OrganizationRepository>,
    usage_repository: Arc<dyn UsageRepository>,
    config: RateLimitConfig,
}

impl PlanQuotaService {
    pub fn new(
        organization_repository: Arc<dyn OrganizationRepository>,
        usage_repository: Arc<dyn UsageRepository>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            organization_repository,
            usage_repository,
            config,
        }
    }

    /// 计算 `now` 所在窗口的起始时间
    pub fn window_start(&self, now: DateTime<Utc>) -> BulkOpsResult<DateTime<Utc>> {
        let window = self.config.window_seconds.max(1) as i64;
        let seconds = now.timestamp();
        let aligned = seconds - seconds.rem_euclid(window);
        DateTime::from_timestamp(aligned, 0).ok_or_else(|| {
            BulkOpsError::Quota(format!("无法计算配额窗口起点: {aligned}"))
        })
    }
}

#[async_trait]
impl QuotaService for PlanQuotaService {
    #[instrument(skip(self))]
    async fn snapshot(&self, organization_id: &str) -> BulkOpsResult<QuotaSnapshot> {
        let plan = self
            .organization_repository
            .get_settings(organization_id)
            .await?
            .map(|settings| settings.plan)
            .unwrap_or_default();

        let window_start = self.window_start(Utc::now())?;
        let used = self
            .usage_repository
            .get_usage(organization_id, window_start)
            .await?;
        let limit = self.config.plans.limit_for(plan);

        debug!("组织 {} 套餐 {} 配额 {}/{}", organization_id, plan, used, limit);
        Ok(QuotaSnapshot {
            limit,
            used,
            window_start,
        })
    }

    async fn record_usage(&self, organization_id: &str, count: u64) -> BulkOpsResult<()> {
        if count == 0 {
            return Ok(());
        }
        let window_start = self.window_start(Utc::now())?;
        self.usage_repository
            .increment(organization_id, window_start, count)
            .await?;
        Ok(())
    }
}
