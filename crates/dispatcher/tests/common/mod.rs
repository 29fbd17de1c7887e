#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

use bulkops_core::{
    config::{PipelineConfig, RateLimitConfig},
    models::{Assignment, AuditRecord, DlqEntry, DlqStatus, OrganizationSettings, QuotaSnapshot},
    traits::{
        AssignmentRepository, AuditRepository, DeadLetterRepository, DeadlineExtensionNotice,
        InvitationNotice, NotificationProvider, OrganizationRepository, QuotaService,
    },
    BulkOpsError, BulkOpsResult, NotificationError,
};
use bulkops_dispatcher::{BulkActionService, PipelineDependencies};
use bulkops_infrastructure::{
    InMemoryAssignmentRepository, InMemoryAuditRepository, InMemoryDeadLetterRepository,
    InMemoryIdempotencyRepository, InMemoryOrganizationRepository, InMemoryUsageRepository,
    PlanQuotaService,
};

pub const ORG: &str = "org-1";
pub const CAMPAIGN: &str = "campaign-1";
pub const ACTOR: &str = "operator-1";

/// 一次通知调用的记录
#[derive(Debug, Clone)]
pub struct NotificationCall {
    pub assignment_id: String,
    pub at: Instant,
}

#[derive(Debug, Clone)]
struct Script {
    /// 剩余失败次数，`None` 表示一直失败
    remaining: Option<u32>,
    error: NotificationError,
}

/// 可按评估分配编排失败的通知服务
#[derive(Debug, Default)]
pub struct ScriptedNotificationProvider {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<NotificationCall>>,
}

impl ScriptedNotificationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_always(&self, assignment_id: &str, error: NotificationError) {
        self.scripts.lock().unwrap().insert(
            assignment_id.to_string(),
            Script {
                remaining: None,
                error,
            },
        );
    }

    pub fn fail_times(&self, assignment_id: &str, times: u32, error: NotificationError) {
        self.scripts.lock().unwrap().insert(
            assignment_id.to_string(),
            Script {
                remaining: Some(times),
                error,
            },
        );
    }

    pub fn calls_for(&self, assignment_id: &str) -> Vec<NotificationCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.assignment_id == assignment_id)
            .cloned()
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn respond(&self, assignment_id: &str) -> Result<(), NotificationError> {
        self.calls.lock().unwrap().push(NotificationCall {
            assignment_id: assignment_id.to_string(),
            at: Instant::now(),
        });

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(assignment_id) {
            Some(script) => match script.remaining {
                None => Err(script.error.clone()),
                Some(0) => Ok(()),
                Some(ref mut remaining) => {
                    *remaining -= 1;
                    Err(script.error.clone())
                }
            },
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NotificationProvider for ScriptedNotificationProvider {
    // 让出一次调度，模拟真实的网络调用，使并发请求能够交错执行
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotificationError> {
        tokio::task::yield_now().await;
        self.respond(&notice.assignment_id)
    }

    async fn notify_deadline_extension(
        &self,
        notice: &DeadlineExtensionNotice,
    ) -> Result<(), NotificationError> {
        tokio::task::yield_now().await;
        self.respond(&notice.assignment_id)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 总是失败的配额服务
pub struct FailingQuotaService;

#[async_trait]
impl QuotaService for FailingQuotaService {
    async fn snapshot(&self, _organization_id: &str) -> BulkOpsResult<QuotaSnapshot> {
        Err(BulkOpsError::Quota("quota backend unavailable".to_string()))
    }

    async fn record_usage(&self, _organization_id: &str, _count: u64) -> BulkOpsResult<()> {
        Err(BulkOpsError::Quota("quota backend unavailable".to_string()))
    }
}

/// 写入总是失败的死信仓储
pub struct FailingDeadLetterRepository;

#[async_trait]
impl DeadLetterRepository for FailingDeadLetterRepository {
    async fn insert(&self, _entry: &DlqEntry) -> BulkOpsResult<()> {
        Err(BulkOpsError::DatabaseOperation("dlq store offline".to_string()))
    }

    async fn get(&self, _id: &str) -> BulkOpsResult<Option<DlqEntry>> {
        Ok(None)
    }

    async fn list_by_organization(&self, _organization_id: &str) -> BulkOpsResult<Vec<DlqEntry>> {
        Ok(vec![])
    }

    async fn update(&self, entry: &DlqEntry) -> BulkOpsResult<()> {
        Err(BulkOpsError::DlqEntryNotFound {
            id: entry.id.clone(),
        })
    }

    async fn transition(
        &self,
        _id: &str,
        _from: DlqStatus,
        _to: DlqStatus,
        _now: DateTime<Utc>,
    ) -> BulkOpsResult<bool> {
        Ok(false)
    }

    async fn delete(&self, id: &str) -> BulkOpsResult<()> {
        Err(BulkOpsError::DlqEntryNotFound { id: id.to_string() })
    }

    async fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> BulkOpsResult<u64> {
        Ok(0)
    }
}

/// 删除总是失败、其余操作正常的死信仓储
pub struct UndeletableDeadLetterRepository {
    inner: Arc<InMemoryDeadLetterRepository>,
}

#[async_trait]
impl DeadLetterRepository for UndeletableDeadLetterRepository {
    async fn insert(&self, entry: &DlqEntry) -> BulkOpsResult<()> {
        self.inner.insert(entry).await
    }

    async fn get(&self, id: &str) -> BulkOpsResult<Option<DlqEntry>> {
        self.inner.get(id).await
    }

    async fn list_by_organization(&self, organization_id: &str) -> BulkOpsResult<Vec<DlqEntry>> {
        self.inner.list_by_organization(organization_id).await
    }

    async fn update(&self, entry: &DlqEntry) -> BulkOpsResult<()> {
        self.inner.update(entry).await
    }

    async fn transition(
        &self,
        id: &str,
        from: DlqStatus,
        to: DlqStatus,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<bool> {
        self.inner.transition(id, from, to, now).await
    }

    async fn delete(&self, _id: &str) -> BulkOpsResult<()> {
        Err(BulkOpsError::DatabaseOperation("dlq store read-only".to_string()))
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> BulkOpsResult<u64> {
        self.inner.purge_older_than(cutoff).await
    }
}

/// 写入总是失败的审计仓储
pub struct FailingAuditRepository;

#[async_trait]
impl AuditRepository for FailingAuditRepository {
    async fn append(&self, _record: &AuditRecord) -> BulkOpsResult<()> {
        Err(BulkOpsError::DatabaseOperation("audit store offline".to_string()))
    }

    async fn list_by_organization(
        &self,
        _organization_id: &str,
        _limit: Option<i64>,
    ) -> BulkOpsResult<Vec<AuditRecord>> {
        Ok(vec![])
    }
}

/// 测试用的管道装配
pub struct Harness {
    pub service: Arc<BulkActionService>,
    pub assignments: Arc<InMemoryAssignmentRepository>,
    pub idempotency: Arc<InMemoryIdempotencyRepository>,
    pub dead_letters: Arc<InMemoryDeadLetterRepository>,
    pub audit: Arc<InMemoryAuditRepository>,
    pub organizations: Arc<InMemoryOrganizationRepository>,
    pub quota: Arc<PlanQuotaService>,
    pub provider: Arc<ScriptedNotificationProvider>,
}

#[derive(Default)]
pub struct HarnessBuilder {
    failing_quota: bool,
    failing_dlq: bool,
    undeletable_dlq: bool,
    failing_audit: bool,
    settings: Option<OrganizationSettings>,
}

impl HarnessBuilder {
    pub fn failing_quota(mut self) -> Self {
        self.failing_quota = true;
        self
    }

    pub fn failing_dlq(mut self) -> Self {
        self.failing_dlq = true;
        self
    }

    pub fn undeletable_dlq(mut self) -> Self {
        self.undeletable_dlq = true;
        self
    }

    pub fn failing_audit(mut self) -> Self {
        self.failing_audit = true;
        self
    }

    pub fn settings(mut self, settings: OrganizationSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub async fn build(self) -> Harness {
        let assignments = Arc::new(InMemoryAssignmentRepository::new());
        let idempotency = Arc::new(InMemoryIdempotencyRepository::new());
        let dead_letters = Arc::new(InMemoryDeadLetterRepository::new());
        let audit = Arc::new(InMemoryAuditRepository::new());
        let organizations = Arc::new(InMemoryOrganizationRepository::new());
        let provider = Arc::new(ScriptedNotificationProvider::new());

        if let Some(settings) = &self.settings {
            organizations.upsert_settings(settings).await.unwrap();
        }

        let quota = Arc::new(PlanQuotaService::new(
            organizations.clone(),
            Arc::new(InMemoryUsageRepository::new()),
            RateLimitConfig::default(),
        ));

        let quota_service: Arc<dyn QuotaService> = if self.failing_quota {
            Arc::new(FailingQuotaService)
        } else {
            quota.clone()
        };
        let dead_letter_repository: Arc<dyn DeadLetterRepository> = if self.failing_dlq {
            Arc::new(FailingDeadLetterRepository)
        } else if self.undeletable_dlq {
            Arc::new(UndeletableDeadLetterRepository {
                inner: dead_letters.clone(),
            })
        } else {
            dead_letters.clone()
        };
        let audit_repository: Arc<dyn AuditRepository> = if self.failing_audit {
            Arc::new(FailingAuditRepository)
        } else {
            audit.clone()
        };

        let service = BulkActionService::new(
            PipelineDependencies {
                assignments: assignments.clone(),
                idempotency: idempotency.clone(),
                dead_letters: dead_letter_repository,
                audit: audit_repository,
                organizations: organizations.clone(),
                quota_service,
                notification_provider: provider.clone(),
            },
            &PipelineConfig::default(),
        );

        Harness {
            service: Arc::new(service),
            assignments,
            idempotency,
            dead_letters,
            audit,
            organizations,
            quota,
            provider,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    /// 写入若干有效的待完成评估分配
    pub async fn seed(&self, ids: &[&str]) -> Vec<String> {
        for id in ids {
            self.seed_assignment(assignment(id, &format!("{id}@example.com")))
                .await;
        }
        ids.iter().map(|id| id.to_string()).collect()
    }

    pub async fn seed_assignment(&self, assignment: Assignment) {
        self.assignments.create(&assignment).await.unwrap();
    }

    pub async fn load(&self, id: &str) -> Assignment {
        self.assignments.get(ORG, id).await.unwrap().unwrap()
    }

    pub async fn snapshot(&self, ids: &[String]) -> Vec<Assignment> {
        let mut result = Vec::new();
        for id in ids {
            result.push(self.load(id).await);
        }
        result
    }
}

pub fn assignment(id: &str, email: &str) -> Assignment {
    Assignment::new(id, ORG, CAMPAIGN, email, Utc::now() + Duration::days(14))
}
