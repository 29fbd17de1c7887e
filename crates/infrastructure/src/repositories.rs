use std::sync::Arc;

use anyhow::Result;
use bulkops_core::config::{DatabaseConfig, StorageBackend};
use bulkops_core::traits::{
    AssignmentRepository, AuditRepository, DeadLetterRepository, IdempotencyRepository,
    OrganizationRepository, UsageRepository,
};
use tracing::info;

use crate::database::{
    DatabaseManager, InMemoryAssignmentRepository, InMemoryAuditRepository,
    InMemoryDeadLetterRepository, InMemoryIdempotencyRepository, InMemoryOrganizationRepository,
    InMemoryUsageRepository,
};

/// 按存储后端装配好的全部仓储
#[derive(Clone)]
pub struct Repositories {
    pub assignments: Arc<dyn AssignmentRepository>,
    pub idempotency: Arc<dyn IdempotencyRepository>,
    pub dead_letters: Arc<dyn DeadLetterRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub usage: Arc<dyn UsageRepository>,
    database: Option<Arc<DatabaseManager>>,
}

impl Repositories {
    /// 根据配置创建仓储，SQLite 后端会先执行迁移
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Memory => {
                info!("使用内存存储后端");
                Ok(Self::in_memory())
            }
            StorageBackend::Sqlite => {
                info!("连接SQLite数据库: {}", config.url);
                let manager = DatabaseManager::new(config).await?;
                manager.migrate().await?;
                Ok(Self::sqlite(Arc::new(manager)))
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            assignments: Arc::new(InMemoryAssignmentRepository::new()),
            idempotency: Arc::new(InMemoryIdempotencyRepository::new()),
            dead_letters: Arc::new(InMemoryDeadLetterRepository::new()),
            audit: Arc::new(InMemoryAuditRepository::new()),
            organizations: Arc::new(InMemoryOrganizationRepository::new()),
            usage: Arc::new(InMemoryUsageRepository::new()),
            database: None,
        }
    }

    pub fn sqlite(manager: Arc<DatabaseManager>) -> Self {
        Self {
            assignments: Arc::new(manager.assignment_repository()),
            idempotency: Arc::new(manager.idempotency_repository()),
            dead_letters: Arc::new(manager.dead_letter_repository()),
            audit: Arc::new(manager.audit_repository()),
            organizations: Arc::new(manager.organization_repository()),
            usage: Arc::new(manager.usage_repository()),
            database: Some(manager),
        }
    }

    /// 存储健康检查，内存后端总是健康
    pub async fn health_check(&self) -> Result<()> {
        match &self.database {
            Some(manager) => manager.health_check().await,
            None => Ok(()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            Some(_) => "sqlite",
            None => "memory",
        }
    }

    pub async fn close(&self) {
        if let Some(manager) = &self.database {
            manager.close().await;
        }
    }
}
