use std::sync::Arc;

use tracing::{error, info};

use bulkops_core::{
    models::{ActionType, AuditRecord, AuditSource, BatchOutcome},
    traits::AuditRepository,
    BulkOpsResult,
};

use crate::metrics;

/// 审计记录器
///
/// 每个批次在全部条目处理完成后写入一条不可变的审计记录。
/// 写入失败不会回滚已经生效的修改。
pub struct AuditRecorder {
    repository: Arc<dyn AuditRepository>,
}

impl AuditRecorder {
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    pub async fn record(
        &self,
        actor_id: &str,
        action_type: ActionType,
        organization_id: &str,
        campaign_id: Option<String>,
        source: AuditSource,
        outcome: BatchOutcome,
    ) -> BulkOpsResult<AuditRecord> {
        let record = AuditRecord::new(
            actor_id,
            action_type,
            organization_id,
            campaign_id,
            source,
            outcome,
        );

        match self.repository.append(&record).await {
            Ok(()) => {
                info!(
                    "审计记录 {} 已写入: 组织 {}，操作 {}，成功 {}，失败 {}，死信 {}",
                    record.id,
                    organization_id,
                    action_type,
                    outcome.succeeded,
                    outcome.failed,
                    outcome.dlq_count
                );
                Ok(record)
            }
            Err(e) => {
                error!(
                    "审计记录写入失败: 组织 {}，操作 {}，执行者 {}: {}",
                    organization_id, action_type, actor_id, e
                );
                metrics::record_audit_write_failure();
                Err(e)
            }
        }
    }

    /// 按时间倒序列出组织的审计记录
    pub async fn list(
        &self,
        organization_id: &str,
        limit: Option<i64>,
    ) -> BulkOpsResult<Vec<AuditRecord>> {
        self.repository
            .list_by_organization(organization_id, limit)
            .await
    }
}
