use async_trait::async_trait;

use crate::models::QuotaSnapshot;
use crate::BulkOpsResult;

/// 组织套餐配额服务接口
///
/// 查询失败时由调用方决定策略，限流器在这种情况下放行。
#[async_trait]
pub trait QuotaService: Send + Sync {
    /// 读取组织当前窗口的配额上限和已用量
    async fn snapshot(&self, organization_id: &str) -> BulkOpsResult<QuotaSnapshot>;

    /// 记录已派发的通知数量
    async fn record_usage(&self, organization_id: &str, count: u64) -> BulkOpsResult<()>;
}
