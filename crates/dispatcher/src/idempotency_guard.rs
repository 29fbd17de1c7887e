use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use bulkops_core::{
    config::MAX_IDEMPOTENCY_COOLDOWN_SECONDS,
    models::{compute_idempotency_key, BatchOutcome, BatchRequest, IdempotencyRecord},
    traits::{ClaimOutcome, IdempotencyRepository},
    BulkOpsError, BulkOpsResult,
};

/// 幂等守卫
///
/// 同一组织、同一操作、同一组目标在冷却窗口内只会执行一次。
/// 占用通过仓储的原子条件写完成，并发提交时只有一个请求能成功。
pub struct IdempotencyGuard {
    repository: Arc<dyn IdempotencyRepository>,
    cooldown: Duration,
}

impl IdempotencyGuard {
    /// 冷却时间超过一年时按一年处理
    pub fn new(repository: Arc<dyn IdempotencyRepository>, cooldown_seconds: u64) -> Self {
        let seconds = i64::try_from(cooldown_seconds.min(MAX_IDEMPOTENCY_COOLDOWN_SECONDS))
            .unwrap_or(i64::MAX);
        Self {
            repository,
            cooldown: Duration::seconds(seconds),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 计算批次指纹，目标列表为空时拒绝
    pub fn key_for(request: &BatchRequest) -> BulkOpsResult<String> {
        if request.target_ids.is_empty() {
            return Err(BulkOpsError::EmptyBatch);
        }
        Ok(compute_idempotency_key(
            request.action_type,
            &request.organization_id,
            &request.target_ids,
        ))
    }

    pub async fn claim(&self, request: &BatchRequest, target_count: usize) -> BulkOpsResult<String> {
        self.claim_at(request, target_count, Utc::now()).await
    }

    /// 以指定时间占用幂等键，冷却期内已有记录时返回 `DuplicateBatch`
    pub async fn claim_at(
        &self,
        request: &BatchRequest,
        target_count: usize,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<String> {
        let key = Self::key_for(request)?;
        let record = IdempotencyRecord::provisional(
            key.clone(),
            &request.organization_id,
            request.action_type,
            target_count,
            now,
            self.cooldown,
        );

        match self.repository.try_claim(&record, now).await? {
            ClaimOutcome::Claimed => {
                debug!("幂等键 {} 占用成功，过期时间 {}", key, record.expires_at);
                Ok(key)
            }
            ClaimOutcome::Existing(existing) => {
                info!(
                    "拒绝重复的批量操作: 组织 {}，幂等键 {}，首次提交于 {}",
                    request.organization_id, key, existing.created_at
                );
                Err(BulkOpsError::DuplicateBatch {
                    key,
                    first_seen_at: existing.created_at,
                })
            }
        }
    }

    /// 写入最终计数，失败只记录日志
    pub async fn finalize(&self, key: &str, outcome: BatchOutcome) {
        if let Err(e) = self.repository.finalize(key, outcome).await {
            warn!("更新幂等记录 {} 失败: {}", key, e);
        }
    }

    /// 批次在占用后被拒绝时释放占用
    pub async fn release(&self, key: &str) {
        if let Err(e) = self.repository.release(key).await {
            warn!("释放幂等键 {} 失败: {}", key, e);
        }
    }
}
