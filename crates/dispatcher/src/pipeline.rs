//! 批量操作管道
//!
//! 执行顺序：参数校验 → 组织配置与功能开关 → 幂等占用 → 限流检查 →
//! 逐条执行（失败进入死信队列）→ 审计记录 → 写回幂等结果。
//! 前四步的失败都是派发前拒绝，不会产生任何修改。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument};

use bulkops_core::{
    config::PipelineConfig,
    models::{
        ActionType, AuditRecord, AuditSource, BatchRequest, BatchResult, DlqEntry, FailedItem,
        FailureKind, OperationalWarning, OrganizationSettings, MAX_CUSTOM_MESSAGE_LEN,
        MAX_EXTENSION_DAYS,
    },
    traits::{
        AssignmentRepository, AuditRepository, DeadLetterRepository, IdempotencyRepository,
        NotificationProvider, OrganizationRepository, QuotaService,
    },
    BulkOpsError, BulkOpsResult,
};

use crate::{
    audit_recorder::AuditRecorder,
    dlq_service::{DlqRetryOutcome, DlqService},
    idempotency_guard::IdempotencyGuard,
    metrics,
    rate_limiter::{RateLimitDecision, RateLimiter},
    retry_executor::{BackoffPolicy, ItemOutcome, RetryExecutor},
};

/// 组装管道所需的外部依赖
#[derive(Clone)]
pub struct PipelineDependencies {
    pub assignments: Arc<dyn AssignmentRepository>,
    pub idempotency: Arc<dyn IdempotencyRepository>,
    pub dead_letters: Arc<dyn DeadLetterRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub quota_service: Arc<dyn QuotaService>,
    pub notification_provider: Arc<dyn NotificationProvider>,
}

/// 批量操作服务，对外暴露执行、死信管理和审计查询
pub struct BulkActionService {
    organizations: Arc<dyn OrganizationRepository>,
    idempotency_guard: IdempotencyGuard,
    rate_limiter: RateLimiter,
    executor: Arc<RetryExecutor>,
    dlq_service: DlqService,
    audit_recorder: Arc<AuditRecorder>,
}

impl BulkActionService {
    pub fn new(deps: PipelineDependencies, config: &PipelineConfig) -> Self {
        let executor = Arc::new(RetryExecutor::new(
            deps.assignments,
            deps.notification_provider,
            BackoffPolicy::from_config(&config.retry),
        ));
        let audit_recorder = Arc::new(AuditRecorder::new(deps.audit));
        let dlq_service = DlqService::new(
            deps.dead_letters,
            Arc::clone(&executor),
            Arc::clone(&audit_recorder),
        );

        Self {
            organizations: deps.organizations,
            idempotency_guard: IdempotencyGuard::new(
                deps.idempotency,
                config.idempotency_cooldown_seconds,
            ),
            rate_limiter: RateLimiter::new(deps.quota_service),
            executor,
            dlq_service,
            audit_recorder,
        }
    }

    /// 执行一次批量操作
    ///
    /// 派发前的拒绝以错误返回；派发后的单项失败只体现在计数中。
    #[instrument(skip(self, request), fields(
        organization_id = %request.organization_id,
        action = %request.action_type,
        targets = request.target_ids.len(),
    ))]
    pub async fn execute_bulk_action(&self, request: BatchRequest) -> BulkOpsResult<BatchResult> {
        let started = Instant::now();
        let action_type = request.action_type;

        match self.run_batch(&request).await {
            Ok(result) => {
                let outcome = if result.failed == 0 {
                    "completed"
                } else {
                    "partial"
                };
                metrics::record_batch(action_type, outcome);
                metrics::record_batch_duration(action_type, started.elapsed().as_secs_f64());
                info!(
                    "批量操作完成: 处理 {}，成功 {}，失败 {}，死信 {}，耗时 {:?}",
                    result.processed,
                    result.succeeded,
                    result.failed,
                    result.dlq_count,
                    started.elapsed()
                );
                Ok(result)
            }
            Err(e) => {
                metrics::record_batch(action_type, rejection_label(&e));
                if e.is_rejection() {
                    info!("批量操作被拒绝: {}", e);
                } else {
                    error!("批量操作执行失败: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn run_batch(&self, request: &BatchRequest) -> BulkOpsResult<BatchResult> {
        validate_request(request)?;
        let targets = request.unique_targets();

        let settings = self.organization_settings(&request.organization_id).await?;
        check_features(&settings, request)?;

        let key = self.idempotency_guard.claim(request, targets.len()).await?;

        let mut result = BatchResult::default();
        match self
            .rate_limiter
            .check(&request.organization_id, targets.len() as u64)
            .await
        {
            Ok(RateLimitDecision::Allowed(_)) => {}
            Ok(RateLimitDecision::FailOpen { error }) => {
                result
                    .warnings
                    .push(OperationalWarning::QuotaLookupFailed { error });
            }
            Err(e) => {
                self.idempotency_guard.release(&key).await;
                return Err(e);
            }
        }

        let mut campaigns = BTreeSet::new();
        for assignment_id in &targets {
            let outcome = self
                .executor
                .execute(
                    &request.organization_id,
                    assignment_id,
                    request.action_type,
                    &request.params,
                )
                .await;

            if outcome.notified() {
                self.rate_limiter
                    .record_usage(&request.organization_id, 1)
                    .await;
            }

            match outcome {
                ItemOutcome::Succeeded { campaign_id, .. } => {
                    result.record_success();
                    campaigns.insert(campaign_id);
                    metrics::record_item(request.action_type, "succeeded");
                }
                ItemOutcome::Failed {
                    attempts, error, ..
                } => {
                    let item = FailedItem {
                        organization_id: request.organization_id.clone(),
                        assignment_id: assignment_id.clone(),
                        action_type: request.action_type,
                        params: request.params.clone(),
                        last_error: error.message().to_string(),
                        error_kind: if error.is_transient() {
                            FailureKind::Transient
                        } else {
                            FailureKind::Permanent
                        },
                        retry_count: attempts,
                        batch_key: Some(key.clone()),
                    };

                    match self.dlq_service.enqueue(item).await {
                        Ok(_) => {
                            result.record_failure(true);
                            metrics::record_item(request.action_type, "dead_lettered");
                        }
                        Err(e) => {
                            result.record_failure(false);
                            result.warnings.push(OperationalWarning::DlqWriteFailed {
                                assignment_id: assignment_id.clone(),
                                error: e.to_string(),
                            });
                            metrics::record_item(request.action_type, "failed");
                        }
                    }
                }
            }
        }

        // 所有成功条目属于同一活动时才记录活动ID
        let campaign_id = if campaigns.len() == 1 {
            campaigns.into_iter().next()
        } else {
            None
        };

        match self
            .audit_recorder
            .record(
                &request.actor_id,
                request.action_type,
                &request.organization_id,
                campaign_id,
                AuditSource::Batch,
                result.outcome(),
            )
            .await
        {
            Ok(record) => result.audit_record_id = Some(record.id),
            Err(e) => result.warnings.push(OperationalWarning::AuditWriteFailed {
                error: e.to_string(),
            }),
        }

        self.idempotency_guard.finalize(&key, result.outcome()).await;
        Ok(result)
    }

    /// 组织配置，没有记录时使用默认值
    pub async fn organization_settings(
        &self,
        organization_id: &str,
    ) -> BulkOpsResult<OrganizationSettings> {
        Ok(self
            .organizations
            .get_settings(organization_id)
            .await?
            .unwrap_or_else(|| OrganizationSettings::defaults_for(organization_id)))
    }

    pub async fn list_dlq_entries(&self, organization_id: &str) -> BulkOpsResult<Vec<DlqEntry>> {
        self.dlq_service.list(organization_id).await
    }

    pub async fn get_dlq_entry(&self, entry_id: &str) -> BulkOpsResult<DlqEntry> {
        self.dlq_service.get(entry_id).await
    }

    pub async fn retry_dlq_entry(
        &self,
        entry_id: &str,
        actor_id: &str,
    ) -> BulkOpsResult<DlqRetryOutcome> {
        self.dlq_service.retry(entry_id, actor_id).await
    }

    pub async fn resolve_dlq_entry(&self, entry_id: &str) -> BulkOpsResult<DlqEntry> {
        self.dlq_service.resolve(entry_id).await
    }

    pub async fn list_audit_records(
        &self,
        organization_id: &str,
        limit: Option<i64>,
    ) -> BulkOpsResult<Vec<AuditRecord>> {
        self.audit_recorder.list(organization_id, limit).await
    }
}

/// 校验请求参数与操作类型是否匹配
pub fn validate_request(request: &BatchRequest) -> BulkOpsResult<()> {
    if request.target_ids.is_empty() {
        return Err(BulkOpsError::EmptyBatch);
    }
    if request.organization_id.trim().is_empty() {
        return Err(BulkOpsError::InvalidParams(
            "organization_id 不能为空".to_string(),
        ));
    }
    if request.actor_id.trim().is_empty() {
        return Err(BulkOpsError::InvalidParams("actor_id 不能为空".to_string()));
    }
    if request.target_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(BulkOpsError::InvalidParams(
            "target_ids 不能包含空ID".to_string(),
        ));
    }

    if let Some(message) = &request.params.custom_message {
        if message.chars().count() > MAX_CUSTOM_MESSAGE_LEN {
            return Err(BulkOpsError::InvalidParams(format!(
                "custom_message 超过 {MAX_CUSTOM_MESSAGE_LEN} 个字符"
            )));
        }
    }

    match request.action_type {
        ActionType::ExtendDeadline => match request.params.extension_days {
            Some(days) if (1..=MAX_EXTENSION_DAYS).contains(&days) => Ok(()),
            Some(days) => Err(BulkOpsError::InvalidParams(format!(
                "extension_days 必须在 1 到 {MAX_EXTENSION_DAYS} 之间: {days}"
            ))),
            None => Err(BulkOpsError::InvalidParams(
                "extend_deadline 需要 extension_days".to_string(),
            )),
        },
        ActionType::ResendInvitation => {
            if request.params.extension_days.is_some() {
                return Err(BulkOpsError::InvalidParams(
                    "resend_invitation 不接受 extension_days".to_string(),
                ));
            }
            Ok(())
        }
    }
}

/// 检查组织功能开关
pub fn check_features(settings: &OrganizationSettings, request: &BatchRequest) -> BulkOpsResult<()> {
    let flags = &settings.feature_flags;
    let disabled = |feature: &str| BulkOpsError::FeatureDisabled {
        organization_id: settings.organization_id.clone(),
        feature: feature.to_string(),
    };

    if !flags.bulk_actions {
        return Err(disabled("bulk_actions"));
    }
    if request.action_type == ActionType::ExtendDeadline && !flags.deadline_extension {
        return Err(disabled("deadline_extension"));
    }
    if request.params.custom_message.is_some() && !flags.custom_messages {
        return Err(disabled("custom_messages"));
    }
    Ok(())
}

fn rejection_label(error: &BulkOpsError) -> &'static str {
    match error {
        BulkOpsError::EmptyBatch | BulkOpsError::InvalidParams(_) => "invalid",
        BulkOpsError::FeatureDisabled { .. } => "feature_disabled",
        BulkOpsError::DuplicateBatch { .. } => "duplicate",
        BulkOpsError::RateLimitExceeded { .. } => "rate_limited",
        _ => "error",
    }
}
