//! 内存仓储实现
//!
//! 使用 `tokio::sync::RwLock<HashMap>` 保存数据，适用于嵌入式部署和测试。
//! 幂等占用在同一把写锁内完成检查和写入，因此是原子的。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use bulkops_core::models::{
    Assignment, AuditRecord, BatchOutcome, DlqEntry, DlqStatus, IdempotencyRecord,
    IdempotencyStatus, OrganizationSettings,
};
use bulkops_core::traits::{
    AssignmentRepository, AuditRepository, ClaimOutcome, DeadLetterRepository,
    IdempotencyRepository, OrganizationRepository, UsageRepository,
};
use bulkops_core::{BulkOpsError, BulkOpsResult};

/// 内存评估分配仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssignmentRepository {
    assignments: Arc<RwLock<HashMap<String, Assignment>>>,
}

impl InMemoryAssignmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_assignments(assignments: Vec<Assignment>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.assignments.write().await;
            for assignment in assignments {
                map.insert(assignment.id.clone(), assignment);
            }
        }
        repo
    }

    pub async fn count(&self) -> usize {
        self.assignments.read().await.len()
    }

    /// 在写锁内修改一条可写的分配，终态或不存在时返回 `AssignmentClosed`
    async fn modify_open<F>(
        &self,
        organization_id: &str,
        id: &str,
        apply: F,
    ) -> BulkOpsResult<Assignment>
    where
        F: FnOnce(&mut Assignment) + Send,
    {
        let mut assignments = self.assignments.write().await;
        match assignments.get_mut(id) {
            Some(existing)
                if existing.organization_id == organization_id && !existing.status.is_terminal() =>
            {
                apply(existing);
                Ok(existing.clone())
            }
            _ => Err(BulkOpsError::AssignmentClosed { id: id.to_string() }),
        }
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryAssignmentRepository {
    async fn create(&self, assignment: &Assignment) -> BulkOpsResult<()> {
        let mut assignments = self.assignments.write().await;
        if assignments.contains_key(&assignment.id) {
            return Err(BulkOpsError::DatabaseOperation(format!(
                "评估分配已存在: {}",
                assignment.id
            )));
        }
        assignments.insert(assignment.id.clone(), assignment.clone());
        Ok(())
    }

    async fn get(&self, organization_id: &str, id: &str) -> BulkOpsResult<Option<Assignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments
            .get(id)
            .filter(|a| a.organization_id == organization_id)
            .cloned())
    }

    async fn update(&self, assignment: &Assignment) -> BulkOpsResult<()> {
        let mut assignments = self.assignments.write().await;
        match assignments.get_mut(&assignment.id) {
            Some(existing) if existing.organization_id == assignment.organization_id => {
                *existing = assignment.clone();
                Ok(())
            }
            _ => Err(BulkOpsError::AssignmentNotFound {
                id: assignment.id.clone(),
            }),
        }
    }

    async fn record_invitation(
        &self,
        organization_id: &str,
        id: &str,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<Assignment> {
        self.modify_open(organization_id, id, |assignment| {
            assignment.record_invitation(token_hash, now)
        })
        .await
    }

    async fn set_deadline(
        &self,
        organization_id: &str,
        id: &str,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<Assignment> {
        self.modify_open(organization_id, id, |assignment| {
            assignment.set_deadline(deadline, now)
        })
        .await
    }

    async fn list_by_campaign(
        &self,
        organization_id: &str,
        campaign_id: &str,
    ) -> BulkOpsResult<Vec<Assignment>> {
        let assignments = self.assignments.read().await;
        let mut result: Vec<Assignment> = assignments
            .values()
            .filter(|a| a.organization_id == organization_id && a.campaign_id == campaign_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }
}

/// 内存幂等记录仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdempotencyRepository {
    records: Arc<RwLock<HashMap<String, IdempotencyRecord>>>,
}

impl InMemoryIdempotencyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl IdempotencyRepository for InMemoryIdempotencyRepository {
    async fn try_claim(
        &self,
        record: &IdempotencyRecord,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<ClaimOutcome> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.key) {
            if !existing.is_expired(now) {
                return Ok(ClaimOutcome::Existing(existing.clone()));
            }
            debug!("幂等记录 {} 已过期，重新占用", record.key);
        }
        records.insert(record.key.clone(), record.clone());
        Ok(ClaimOutcome::Claimed)
    }

    async fn get(&self, key: &str) -> BulkOpsResult<Option<IdempotencyRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn finalize(&self, key: &str, outcome: BatchOutcome) -> BulkOpsResult<()> {
        let mut records = self.records.write().await;
        let record = records.get_mut(key).ok_or_else(|| {
            BulkOpsError::DatabaseOperation(format!("幂等记录不存在: {key}"))
        })?;
        record.status = IdempotencyStatus::Completed;
        record.outcome = Some(outcome);
        Ok(())
    }

    async fn release(&self, key: &str) -> BulkOpsResult<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> BulkOpsResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

/// 内存死信队列仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeadLetterRepository {
    entries: Arc<RwLock<HashMap<String, DlqEntry>>>,
}

impl InMemoryDeadLetterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl DeadLetterRepository for InMemoryDeadLetterRepository {
    async fn insert(&self, entry: &DlqEntry) -> BulkOpsResult<()> {
        self.entries
            .write()
            .await
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> BulkOpsResult<Option<DlqEntry>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn list_by_organization(&self, organization_id: &str) -> BulkOpsResult<Vec<DlqEntry>> {
        let entries = self.entries.read().await;
        let mut result: Vec<DlqEntry> = entries
            .values()
            .filter(|e| e.organization_id == organization_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update(&self, entry: &DlqEntry) -> BulkOpsResult<()> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&entry.id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(BulkOpsError::DlqEntryNotFound {
                id: entry.id.clone(),
            }),
        }
    }

    async fn transition(
        &self,
        id: &str,
        from: DlqStatus,
        to: DlqStatus,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<bool> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) if entry.status == from => {
                entry.status = to;
                entry.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> BulkOpsResult<()> {
        match self.entries.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(BulkOpsError::DlqEntryNotFound { id: id.to_string() }),
        }
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> BulkOpsResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

/// 内存审计记录仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditRepository {
    records: Arc<RwLock<Vec<AuditRecord>>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(&self, record: &AuditRecord) -> BulkOpsResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn list_by_organization(
        &self,
        organization_id: &str,
        limit: Option<i64>,
    ) -> BulkOpsResult<Vec<AuditRecord>> {
        let records = self.records.read().await;
        let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.organization_id == organization_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// 内存组织配置仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrganizationRepository {
    settings: Arc<RwLock<HashMap<String, OrganizationSettings>>>,
}

impl InMemoryOrganizationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryOrganizationRepository {
    async fn get_settings(
        &self,
        organization_id: &str,
    ) -> BulkOpsResult<Option<OrganizationSettings>> {
        Ok(self.settings.read().await.get(organization_id).cloned())
    }

    async fn upsert_settings(&self, settings: &OrganizationSettings) -> BulkOpsResult<()> {
        self.settings
            .write()
            .await
            .insert(settings.organization_id.clone(), settings.clone());
        Ok(())
    }
}

/// 内存配额用量仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryUsageRepository {
    counters: Arc<RwLock<HashMap<(String, DateTime<Utc>), u64>>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn get_usage(
        &self,
        organization_id: &str,
        window_start: DateTime<Utc>,
    ) -> BulkOpsResult<u64> {
        let counters = self.counters.read().await;
        Ok(counters
            .get(&(organization_id.to_string(), window_start))
            .copied()
            .unwrap_or(0))
    }

    async fn increment(
        &self,
        organization_id: &str,
        window_start: DateTime<Utc>,
        amount: u64,
    ) -> BulkOpsResult<u64> {
        let mut counters = self.counters.write().await;
        let counter = counters
            .entry((organization_id.to_string(), window_start))
            .or_insert(0);
        *counter += amount;
        Ok(*counter)
    }
}
