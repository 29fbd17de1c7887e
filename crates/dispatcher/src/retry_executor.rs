use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use bulkops_core::{
    config::RetryConfig,
    models::{issue_invitation_token, ActionType, Assignment, BulkActionParams},
    traits::{
        AssignmentRepository, DeadlineExtensionNotice, InvitationNotice, NotificationProvider,
    },
    ActionError,
};

/// 指数退避策略
///
/// 第 k 次重试前等待 `min(initial * factor^(k-1), max)`，
/// `max_attempts` 是单个目标的总尝试次数。
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    backoff_factor: f64,
    max_delay: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(
        initial_delay: Duration,
        backoff_factor: f64,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_delay,
            backoff_factor,
            max_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_factor,
            Duration::from_millis(config.max_delay_ms),
            config.max_retries,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 `retry_index` 次重试（从 0 开始）前的等待时间
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let initial = self.initial_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64;
        let exponent = retry_index.min(i32::MAX as u32) as i32;
        let delay = (initial * self.backoff_factor.powi(exponent)).min(max);
        Duration::from_millis(delay.max(0.0) as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// 单个目标的执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Succeeded {
        attempts: u32,
        campaign_id: String,
    },
    Failed {
        attempts: u32,
        error: ActionError,
        /// 是否曾有一次通知被服务商接受
        notified: bool,
    },
}

impl ItemOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            ItemOutcome::Succeeded { attempts, .. } | ItemOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    /// 计入配额用量的通知是否已送达
    pub fn notified(&self) -> bool {
        match self {
            ItemOutcome::Succeeded { .. } => true,
            ItemOutcome::Failed { notified, .. } => *notified,
        }
    }
}

/// 通知已被服务商接受、尚待写回的修改
#[derive(Debug, Clone)]
enum PendingWrite {
    Invitation {
        token_hash: String,
        sent_at: DateTime<Utc>,
    },
    Deadline {
        deadline: DateTime<Utc>,
        changed_at: DateTime<Utc>,
    },
}

/// 单次尝试失败时的错误
///
/// `pending` 不为空表示通知已送达，只剩写回失败，下一次尝试只重试写回。
struct AttemptError {
    error: ActionError,
    pending: Option<PendingWrite>,
}

impl From<ActionError> for AttemptError {
    fn from(error: ActionError) -> Self {
        Self {
            error,
            pending: None,
        }
    }
}

/// 对单个评估分配执行批量操作，临时错误按退避策略重试
pub struct RetryExecutor {
    assignment_repository: Arc<dyn AssignmentRepository>,
    notification_provider: Arc<dyn NotificationProvider>,
    policy: BackoffPolicy,
}

impl RetryExecutor {
    pub fn new(
        assignment_repository: Arc<dyn AssignmentRepository>,
        notification_provider: Arc<dyn NotificationProvider>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            assignment_repository,
            notification_provider,
            policy,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    #[instrument(skip(self, params))]
    pub async fn execute(
        &self,
        organization_id: &str,
        assignment_id: &str,
        action_type: ActionType,
        params: &BulkActionParams,
    ) -> ItemOutcome {
        let mut notified = false;
        let mut pending: Option<PendingWrite> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match pending.take() {
                Some(write) => {
                    debug!("评估分配 {} 的通知已送达，仅重试写回", assignment_id);
                    self.persist(organization_id, assignment_id, write).await
                }
                None => {
                    self.attempt(organization_id, assignment_id, action_type, params)
                        .await
                }
            };

            match result {
                Ok(assignment) => {
                    debug!("评估分配 {} 第 {} 次尝试成功", assignment_id, attempt);
                    return ItemOutcome::Succeeded {
                        attempts: attempt,
                        campaign_id: assignment.campaign_id,
                    };
                }
                Err(failure) => {
                    notified |= failure.pending.is_some();
                    pending = failure.pending;
                    let error = failure.error;

                    if !error.is_transient() {
                        warn!("评估分配 {} 永久失败: {}", assignment_id, error);
                        return ItemOutcome::Failed {
                            attempts: attempt,
                            error,
                            notified,
                        };
                    }

                    if attempt >= self.policy.max_attempts() {
                        warn!(
                            "评估分配 {} 在 {} 次尝试后仍失败: {}",
                            assignment_id, attempt, error
                        );
                        return ItemOutcome::Failed {
                            attempts: attempt,
                            error,
                            notified,
                        };
                    }

                    let delay = self.policy.delay_for(attempt - 1);
                    debug!(
                        "评估分配 {} 第 {} 次尝试临时失败，{:?} 后重试: {}",
                        assignment_id, attempt, delay, error
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// 一次完整尝试：加载、校验、发送通知、写回修改
    async fn attempt(
        &self,
        organization_id: &str,
        assignment_id: &str,
        action_type: ActionType,
        params: &BulkActionParams,
    ) -> Result<Assignment, AttemptError> {
        let assignment = self
            .assignment_repository
            .get(organization_id, assignment_id)
            .await
            .map_err(ActionError::from)?
            .ok_or_else(|| {
                ActionError::Permanent(format!(
                    "评估分配 {assignment_id} 不存在或不属于组织 {organization_id}"
                ))
            })?;

        if assignment.status.is_terminal() {
            return Err(ActionError::Permanent(format!(
                "评估分配 {} 状态为 {}，不接受批量操作",
                assignment.id, assignment.status
            ))
            .into());
        }

        if !assignment.has_valid_recipient() {
            return Err(ActionError::Permanent(format!(
                "评估分配 {} 的收件人地址无效: {}",
                assignment.id, assignment.evaluator_email
            ))
            .into());
        }

        let now = Utc::now();
        let write = match action_type {
            ActionType::ResendInvitation => {
                let (token, token_hash) = issue_invitation_token();
                let notice = InvitationNotice {
                    organization_id: assignment.organization_id.clone(),
                    assignment_id: assignment.id.clone(),
                    campaign_id: assignment.campaign_id.clone(),
                    recipient: assignment.evaluator_email.clone(),
                    recipient_name: assignment.evaluator_name.clone(),
                    token,
                    deadline: assignment.deadline,
                    custom_message: params.custom_message.clone(),
                };
                self.notification_provider
                    .send_invitation(&notice)
                    .await
                    .map_err(ActionError::from)?;
                PendingWrite::Invitation {
                    token_hash,
                    sent_at: now,
                }
            }
            ActionType::ExtendDeadline => {
                let days = params.extension_days.ok_or_else(|| {
                    ActionError::Permanent("延期操作缺少 extension_days".to_string())
                })?;
                let deadline = assignment.extended_deadline(days);
                let notice = DeadlineExtensionNotice {
                    organization_id: assignment.organization_id.clone(),
                    assignment_id: assignment.id.clone(),
                    campaign_id: assignment.campaign_id.clone(),
                    recipient: assignment.evaluator_email.clone(),
                    recipient_name: assignment.evaluator_name.clone(),
                    new_deadline: deadline,
                    extension_days: days,
                    custom_message: params.custom_message.clone(),
                };
                self.notification_provider
                    .notify_deadline_extension(&notice)
                    .await
                    .map_err(ActionError::from)?;
                PendingWrite::Deadline {
                    deadline,
                    changed_at: now,
                }
            }
        };

        self.persist(organization_id, assignment_id, write).await
    }

    /// 写回已送达通知对应的修改，只触及令牌、邀请计数和截止时间
    ///
    /// 分配在发送期间进入终态时写入被拒绝，按永久失败处理。
    async fn persist(
        &self,
        organization_id: &str,
        assignment_id: &str,
        write: PendingWrite,
    ) -> Result<Assignment, AttemptError> {
        let result = match &write {
            PendingWrite::Invitation {
                token_hash,
                sent_at,
            } => {
                self.assignment_repository
                    .record_invitation(organization_id, assignment_id, token_hash, *sent_at)
                    .await
            }
            PendingWrite::Deadline {
                deadline,
                changed_at,
            } => {
                self.assignment_repository
                    .set_deadline(organization_id, assignment_id, *deadline, *changed_at)
                    .await
            }
        };

        result.map_err(|e| AttemptError {
            error: ActionError::from(e),
            pending: Some(write),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_schedule() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_attempts(), 5);

        let delays: Vec<u64> = (0..7).map(|k| policy.delay_for(k).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 32000, 32000]);
    }

    #[test]
    fn test_backoff_capped_for_large_attempts() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(1_000), Duration::from_millis(32_000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(32_000));
    }

    #[test]
    fn test_custom_policy() {
        let policy = BackoffPolicy::new(
            Duration::from_millis(100),
            3.0,
            Duration::from_millis(1_000),
            0,
        );
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(300));
        assert_eq!(policy.delay_for(2), Duration::from_millis(900));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1_000));
    }
}
