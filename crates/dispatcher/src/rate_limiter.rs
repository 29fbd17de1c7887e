use std::sync::Arc;

use tracing::{debug, info, warn};

use bulkops_core::{models::QuotaSnapshot, traits::QuotaService, BulkOpsError, BulkOpsResult};

use crate::metrics;

/// 限流检查结果
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitDecision {
    /// 配额充足
    Allowed(QuotaSnapshot),
    /// 配额查询失败，按放行处理
    FailOpen { error: String },
}

/// 基于套餐配额的限流器
///
/// 检查与计数之间不加锁，并发批次下是尽力而为的限制。
pub struct RateLimiter {
    quota_service: Arc<dyn QuotaService>,
}

impl RateLimiter {
    pub fn new(quota_service: Arc<dyn QuotaService>) -> Self {
        Self { quota_service }
    }

    /// 检查本次请求的条目数是否在剩余配额内
    pub async fn check(
        &self,
        organization_id: &str,
        requested: u64,
    ) -> BulkOpsResult<RateLimitDecision> {
        let snapshot = match self.quota_service.snapshot(organization_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("组织 {} 配额查询失败，放行本次批量操作: {}", organization_id, e);
                metrics::record_rate_limit_fail_open();
                return Ok(RateLimitDecision::FailOpen {
                    error: e.to_string(),
                });
            }
        };

        if !snapshot.allows(requested) {
            info!(
                "组织 {} 超出配额: 上限 {}，已用 {}，本次请求 {}",
                organization_id, snapshot.limit, snapshot.used, requested
            );
            return Err(BulkOpsError::RateLimitExceeded {
                organization_id: organization_id.to_string(),
                limit: snapshot.limit,
                used: snapshot.used,
                requested,
            });
        }

        debug!(
            "组织 {} 配额检查通过: 剩余 {}，本次请求 {}",
            organization_id,
            snapshot.remaining(),
            requested
        );
        Ok(RateLimitDecision::Allowed(snapshot))
    }

    /// 记录已送达的通知数量，失败只记录日志
    pub async fn record_usage(&self, organization_id: &str, count: u64) {
        if count == 0 {
            return;
        }
        if let Err(e) = self.quota_service.record_usage(organization_id, count).await {
            warn!("组织 {} 配额用量记录失败: {}", organization_id, e);
        }
    }
}
