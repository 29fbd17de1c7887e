use async_trait::async_trait;
use bulkops_core::models::AuditRecord;
use bulkops_core::traits::AuditRepository;
use bulkops_core::BulkOpsResult;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> BulkOpsResult<AuditRecord> {
        Ok(AuditRecord {
            id: row.try_get("id")?,
            actor_id: row.try_get("actor_id")?,
            action_type: row.try_get("action_type")?,
            organization_id: row.try_get("organization_id")?,
            campaign_id: row.try_get("campaign_id")?,
            source: row.try_get("source")?,
            affected_count: row.try_get("affected_count")?,
            succeeded_count: row.try_get("succeeded_count")?,
            failed_count: row.try_get("failed_count")?,
            dlq_count: row.try_get("dlq_count")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    #[instrument(skip(self, record), fields(
        audit_record_id = %record.id,
        organization_id = %record.organization_id,
    ))]
    async fn append(&self, record: &AuditRecord) -> BulkOpsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_records (id, actor_id, action_type, organization_id, campaign_id,
                                       source, affected_count, succeeded_count, failed_count,
                                       dlq_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&record.id)
        .bind(&record.actor_id)
        .bind(record.action_type)
        .bind(&record.organization_id)
        .bind(&record.campaign_id)
        .bind(record.source)
        .bind(record.affected_count)
        .bind(record.succeeded_count)
        .bind(record.failed_count)
        .bind(record.dlq_count)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_organization(
        &self,
        organization_id: &str,
        limit: Option<i64>,
    ) -> BulkOpsResult<Vec<AuditRecord>> {
        // SQLite 中 LIMIT -1 表示不限制
        let rows = sqlx::query(
            "SELECT id, actor_id, action_type, organization_id, campaign_id, source, \
                    affected_count, succeeded_count, failed_count, dlq_count, created_at \
             FROM audit_records WHERE organization_id = $1 ORDER BY seq DESC LIMIT $2",
        )
        .bind(organization_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }
}
