//! 数据仓储层接口定义
//!
//! 此模块定义了批量操作管道依赖的持久化抽象：
//! - 评估分配仓储 (AssignmentRepository)
//! - 幂等记录仓储 (IdempotencyRepository)
//! - 死信队列仓储 (DeadLetterRepository)
//! - 审计记录仓储 (AuditRepository)
//! - 组织配置与配额用量仓储 (OrganizationRepository / UsageRepository)
//!
//! ## 设计原则
//!
//! 每个仓储接口只负责单一实体，所有操作均为异步并返回 `BulkOpsResult<T>`。
//! 接口要求 `Send + Sync`，以 `Arc<dyn Trait>` 的形式在服务间共享。
//! 目前提供内存实现和 SQLite 实现。
//!
//! ## 组织隔离
//!
//! 分配的读取总是带上组织ID，跨组织的ID在查询层面就不可见。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Assignment, AuditRecord, BatchOutcome, DlqEntry, DlqStatus, IdempotencyRecord,
    OrganizationSettings,
};
use crate::BulkOpsResult;

/// 评估分配仓储接口
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// 创建分配（活动启动或数据导入时使用）
    async fn create(&self, assignment: &Assignment) -> BulkOpsResult<()>;

    /// 在组织范围内按ID读取分配
    ///
    /// 分配不存在或属于其他组织时返回 `None`。
    async fn get(&self, organization_id: &str, id: &str) -> BulkOpsResult<Option<Assignment>>;

    /// 更新分配
    ///
    /// 分配不存在时返回 `AssignmentNotFound`。
    async fn update(&self, assignment: &Assignment) -> BulkOpsResult<()>;

    /// 记录一次已发送的邀请，只写令牌哈希、邀请次数、`last_invited_at`
    /// 和 `updated_at`，返回写入后的分配
    ///
    /// 分配不存在、属于其他组织或已处于终态时返回 `AssignmentClosed`。
    async fn record_invitation(
        &self,
        organization_id: &str,
        id: &str,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<Assignment>;

    /// 写入新的截止时间，只写 `deadline` 和 `updated_at`
    ///
    /// 约束与 `record_invitation` 相同。
    async fn set_deadline(
        &self,
        organization_id: &str,
        id: &str,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<Assignment>;

    /// 列出某个活动下的全部分配
    async fn list_by_campaign(
        &self,
        organization_id: &str,
        campaign_id: &str,
    ) -> BulkOpsResult<Vec<Assignment>>;
}

/// 幂等占用的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// 成功写入临时记录
    Claimed,
    /// 冷却窗口内已存在记录
    Existing(IdempotencyRecord),
}

/// 幂等记录仓储接口
///
/// `try_claim` 必须是条件写入：同一个键只有在不存在或已过期时才能被占用。
#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// 以条件写入的方式占用幂等键
    async fn try_claim(
        &self,
        record: &IdempotencyRecord,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<ClaimOutcome>;

    async fn get(&self, key: &str) -> BulkOpsResult<Option<IdempotencyRecord>>;

    /// 记录批次结果并标记为完成
    async fn finalize(&self, key: &str, outcome: BatchOutcome) -> BulkOpsResult<()>;

    /// 释放占用（批次在派发前被拒绝时使用）
    async fn release(&self, key: &str) -> BulkOpsResult<()>;

    /// 删除已过期的记录，返回删除数量
    async fn purge_expired(&self, now: DateTime<Utc>) -> BulkOpsResult<u64>;
}

/// 死信队列仓储接口
#[async_trait]
pub trait DeadLetterRepository: Send + Sync {
    async fn insert(&self, entry: &DlqEntry) -> BulkOpsResult<()>;

    async fn get(&self, id: &str) -> BulkOpsResult<Option<DlqEntry>>;

    /// 按创建时间倒序列出组织的死信条目
    async fn list_by_organization(&self, organization_id: &str) -> BulkOpsResult<Vec<DlqEntry>>;

    /// 条目不存在时返回 `DlqEntryNotFound`
    async fn update(&self, entry: &DlqEntry) -> BulkOpsResult<()>;

    /// 条件状态迁移：仅当条目当前状态为 `from` 时改为 `to`
    ///
    /// 返回是否发生了迁移，并发调用中只有一个能成功。
    async fn transition(
        &self,
        id: &str,
        from: DlqStatus,
        to: DlqStatus,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<bool>;

    /// 条目不存在时返回 `DlqEntryNotFound`
    async fn delete(&self, id: &str) -> BulkOpsResult<()>;

    /// 删除创建时间早于 `cutoff` 的条目，返回删除数量
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> BulkOpsResult<u64>;
}

/// 审计记录仓储接口，只追加不修改
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> BulkOpsResult<()>;

    /// 按创建时间倒序列出组织的审计记录
    async fn list_by_organization(
        &self,
        organization_id: &str,
        limit: Option<i64>,
    ) -> BulkOpsResult<Vec<AuditRecord>>;
}

/// 组织配置仓储接口
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn get_settings(&self, organization_id: &str)
        -> BulkOpsResult<Option<OrganizationSettings>>;

    async fn upsert_settings(&self, settings: &OrganizationSettings) -> BulkOpsResult<()>;
}

/// 配额用量仓储接口，按组织和时间窗口计数
#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn get_usage(
        &self,
        organization_id: &str,
        window_start: DateTime<Utc>,
    ) -> BulkOpsResult<u64>;

    /// 原子递增用量，返回递增后的值
    async fn increment(
        &self,
        organization_id: &str,
        window_start: DateTime<Utc>,
        amount: u64,
    ) -> BulkOpsResult<u64>;
}
