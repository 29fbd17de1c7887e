use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use bulkops_core::{
    models::{AuditSource, BatchOutcome, DlqEntry, DlqStatus, FailedItem, OperationalWarning},
    traits::DeadLetterRepository,
    BulkOpsError, BulkOpsResult,
};

use crate::{
    audit_recorder::AuditRecorder,
    metrics,
    retry_executor::{ItemOutcome, RetryExecutor},
};

/// 手动重试死信条目的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DlqRetryOutcome {
    /// 重试成功，条目已移出死信队列
    Succeeded {
        entry_id: String,
        audit_record_id: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<OperationalWarning>,
    },
    /// 重试仍失败，条目已标记为 `failed`
    Failed { entry: DlqEntry },
}

/// 死信队列服务
pub struct DlqService {
    repository: Arc<dyn DeadLetterRepository>,
    executor: Arc<RetryExecutor>,
    audit_recorder: Arc<AuditRecorder>,
}

impl DlqService {
    pub fn new(
        repository: Arc<dyn DeadLetterRepository>,
        executor: Arc<RetryExecutor>,
        audit_recorder: Arc<AuditRecorder>,
    ) -> Self {
        Self {
            repository,
            executor,
            audit_recorder,
        }
    }

    /// 写入一条待重试的死信条目
    pub async fn enqueue(&self, item: FailedItem) -> BulkOpsResult<DlqEntry> {
        let entry = DlqEntry::from_failed_item(item, Utc::now());
        match self.repository.insert(&entry).await {
            Ok(()) => {
                metrics::record_dlq_entry();
                info!(
                    "评估分配 {} 已写入死信队列: 条目 {}，原因 {}",
                    entry.assignment_id, entry.id, entry.last_error
                );
                Ok(entry)
            }
            Err(e) => {
                error!("评估分配 {} 写入死信队列失败: {}", entry.assignment_id, e);
                Err(e)
            }
        }
    }

    pub async fn list(&self, organization_id: &str) -> BulkOpsResult<Vec<DlqEntry>> {
        self.repository.list_by_organization(organization_id).await
    }

    pub async fn get(&self, entry_id: &str) -> BulkOpsResult<DlqEntry> {
        self.repository
            .get(entry_id)
            .await?
            .ok_or_else(|| BulkOpsError::DlqEntryNotFound {
                id: entry_id.to_string(),
            })
    }

    /// 重新执行死信条目对应的单个目标
    ///
    /// 只有 `pending_retry` 状态的条目可以重试，执行前先以条件写把条目
    /// 改为 `retrying`，并发的重试请求只有一个能继续。成功时先写入来源为
    /// `dlq_retry` 的审计记录再删除条目；失败时条目转为 `failed`。
    #[instrument(skip(self))]
    pub async fn retry(&self, entry_id: &str, actor_id: &str) -> BulkOpsResult<DlqRetryOutcome> {
        let mut entry = self.get(entry_id).await?;
        if !entry.is_retryable() {
            return Err(BulkOpsError::DlqEntryNotRetryable {
                id: entry.id.clone(),
                status: entry.status.to_string(),
            });
        }

        let claimed = self
            .repository
            .transition(
                &entry.id,
                DlqStatus::PendingRetry,
                DlqStatus::Retrying,
                Utc::now(),
            )
            .await?;
        if !claimed {
            let current = self.get(&entry.id).await?;
            info!("死信条目 {} 已被其他请求占用，状态 {}", current.id, current.status);
            return Err(BulkOpsError::DlqEntryNotRetryable {
                id: current.id,
                status: current.status.to_string(),
            });
        }
        entry.status = DlqStatus::Retrying;

        let outcome = self
            .executor
            .execute(
                &entry.organization_id,
                &entry.assignment_id,
                entry.action_type,
                &entry.params,
            )
            .await;

        match outcome {
            ItemOutcome::Succeeded { campaign_id, .. } => {
                let mut warnings = Vec::new();
                let counts = BatchOutcome {
                    processed: 1,
                    succeeded: 1,
                    failed: 0,
                    dlq_count: 0,
                };
                let audit_record_id = match self
                    .audit_recorder
                    .record(
                        actor_id,
                        entry.action_type,
                        &entry.organization_id,
                        Some(campaign_id),
                        AuditSource::DlqRetry,
                        counts,
                    )
                    .await
                {
                    Ok(record) => Some(record.id),
                    Err(e) => {
                        warnings.push(OperationalWarning::AuditWriteFailed {
                            error: e.to_string(),
                        });
                        None
                    }
                };

                match self.repository.delete(&entry.id).await {
                    Ok(()) => info!("死信条目 {} 重试成功，已移出死信队列", entry.id),
                    Err(e) => {
                        warn!("死信条目 {} 重试成功但删除失败: {}", entry.id, e);
                        warnings.push(OperationalWarning::DlqDeleteFailed {
                            entry_id: entry.id.clone(),
                            error: e.to_string(),
                        });
                    }
                }

                Ok(DlqRetryOutcome::Succeeded {
                    entry_id: entry.id,
                    audit_record_id,
                    warnings,
                })
            }
            ItemOutcome::Failed {
                attempts, error, ..
            } => {
                warn!("死信条目 {} 重试失败: {}", entry.id, error);
                entry.mark_failed(error.message().to_string(), attempts, Utc::now());
                if let Err(e) = self.repository.update(&entry).await {
                    error!("死信条目 {} 标记失败状态时出错: {}", entry.id, e);
                    return Err(e);
                }
                Ok(DlqRetryOutcome::Failed { entry })
            }
        }
    }

    /// 人工处理后移除条目
    pub async fn resolve(&self, entry_id: &str) -> BulkOpsResult<DlqEntry> {
        let entry = self.get(entry_id).await?;
        self.repository.delete(&entry.id).await?;
        info!("死信条目 {} 已人工处理并移除", entry.id);
        Ok(entry)
    }
}
