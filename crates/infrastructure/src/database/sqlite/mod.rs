pub mod sqlite_assignment_repository;
pub mod sqlite_audit_repository;
pub mod sqlite_dlq_repository;
pub mod sqlite_idempotency_repository;
pub mod sqlite_organization_repository;

pub use sqlite_assignment_repository::SqliteAssignmentRepository;
pub use sqlite_audit_repository::SqliteAuditRepository;
pub use sqlite_dlq_repository::SqliteDeadLetterRepository;
pub use sqlite_idempotency_repository::SqliteIdempotencyRepository;
pub use sqlite_organization_repository::{SqliteOrganizationRepository, SqliteUsageRepository};

use std::time::Duration;

use anyhow::{Context, Result};
use bulkops_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// SQLite 连接池管理
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("无效的数据库连接串: {}", config.url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(1800)) // 30分钟默认生命周期
            .connect_with(options)
            .await
            .context("连接数据库失败")?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 执行内嵌的数据库迁移
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .context("运行数据库迁移失败")?;
        info!("数据库迁移完成");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn assignment_repository(&self) -> SqliteAssignmentRepository {
        SqliteAssignmentRepository::new(self.pool.clone())
    }

    pub fn idempotency_repository(&self) -> SqliteIdempotencyRepository {
        SqliteIdempotencyRepository::new(self.pool.clone())
    }

    pub fn dead_letter_repository(&self) -> SqliteDeadLetterRepository {
        SqliteDeadLetterRepository::new(self.pool.clone())
    }

    pub fn audit_repository(&self) -> SqliteAuditRepository {
        SqliteAuditRepository::new(self.pool.clone())
    }

    pub fn organization_repository(&self) -> SqliteOrganizationRepository {
        SqliteOrganizationRepository::new(self.pool.clone())
    }

    pub fn usage_repository(&self) -> SqliteUsageRepository {
        SqliteUsageRepository::new(self.pool.clone())
    }
}
