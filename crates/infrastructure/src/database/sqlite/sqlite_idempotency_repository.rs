use async_trait::async_trait;
use bulkops_core::models::{BatchOutcome, IdempotencyRecord, IdempotencyStatus};
use bulkops_core::traits::{ClaimOutcome, IdempotencyRepository};
use bulkops_core::{BulkOpsError, BulkOpsResult};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

pub struct SqliteIdempotencyRepository {
    pool: SqlitePool,
}

impl SqliteIdempotencyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> BulkOpsResult<IdempotencyRecord> {
        let outcome: Option<Json<BatchOutcome>> = row.try_get("outcome")?;
        Ok(IdempotencyRecord {
            key: row.try_get("key")?,
            organization_id: row.try_get("organization_id")?,
            action_type: row.try_get("action_type")?,
            target_count: row.try_get("target_count")?,
            status: row.try_get("status")?,
            outcome: outcome.map(|json| json.0),
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

#[async_trait]
impl IdempotencyRepository for SqliteIdempotencyRepository {
    /// 单条语句完成占用：键不存在时插入，已存在但过期时覆盖，否则不做修改
    #[instrument(skip(self, record), fields(key = %record.key))]
    async fn try_claim(
        &self,
        record: &IdempotencyRecord,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<ClaimOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_records (key, organization_id, action_type, target_count,
                                             status, outcome, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, NULL, $6, $7)
            ON CONFLICT (key) DO UPDATE SET
                organization_id = excluded.organization_id,
                action_type = excluded.action_type,
                target_count = excluded.target_count,
                status = excluded.status,
                outcome = NULL,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            WHERE idempotency_records.expires_at <= $8
            "#,
        )
        .bind(&record.key)
        .bind(&record.organization_id)
        .bind(record.action_type)
        .bind(record.target_count)
        .bind(record.status)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!("幂等键 {} 占用成功", record.key);
            return Ok(ClaimOutcome::Claimed);
        }

        match self.get(&record.key).await? {
            Some(existing) => Ok(ClaimOutcome::Existing(existing)),
            None => Err(BulkOpsError::DatabaseOperation(format!(
                "幂等键 {} 占用冲突后记录消失",
                record.key
            ))),
        }
    }

    async fn get(&self, key: &str) -> BulkOpsResult<Option<IdempotencyRecord>> {
        let row = sqlx::query(
            "SELECT key, organization_id, action_type, target_count, status, outcome, \
                    created_at, expires_at \
             FROM idempotency_records WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn finalize(&self, key: &str, outcome: BatchOutcome) -> BulkOpsResult<()> {
        let result = sqlx::query(
            "UPDATE idempotency_records SET status = $2, outcome = $3 WHERE key = $1",
        )
        .bind(key)
        .bind(IdempotencyStatus::Completed)
        .bind(Json(outcome))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BulkOpsError::DatabaseOperation(format!(
                "幂等记录不存在: {key}"
            )));
        }
        Ok(())
    }

    async fn release(&self, key: &str) -> BulkOpsResult<()> {
        sqlx::query("DELETE FROM idempotency_records WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> BulkOpsResult<u64> {
        let result = sqlx::query("DELETE FROM idempotency_records WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
