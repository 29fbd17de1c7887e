use async_trait::async_trait;
use bulkops_core::models::{BulkActionParams, DlqEntry, DlqStatus};
use bulkops_core::traits::DeadLetterRepository;
use bulkops_core::{BulkOpsError, BulkOpsResult};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const DLQ_COLUMNS: &str = "id, organization_id, assignment_id, action_type, params, last_error, \
     error_kind, retry_count, status, batch_key, created_at, updated_at";

pub struct SqliteDeadLetterRepository {
    pool: SqlitePool,
}

impl SqliteDeadLetterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> BulkOpsResult<DlqEntry> {
        let params: Json<BulkActionParams> = row.try_get("params")?;
        Ok(DlqEntry {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            assignment_id: row.try_get("assignment_id")?,
            action_type: row.try_get("action_type")?,
            params: params.0,
            last_error: row.try_get("last_error")?,
            error_kind: row.try_get("error_kind")?,
            retry_count: row.try_get("retry_count")?,
            status: row.try_get("status")?,
            batch_key: row.try_get("batch_key")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl DeadLetterRepository for SqliteDeadLetterRepository {
    #[instrument(skip(self, entry), fields(
        dlq_entry_id = %entry.id,
        assignment_id = %entry.assignment_id,
    ))]
    async fn insert(&self, entry: &DlqEntry) -> BulkOpsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO dlq_entries (id, organization_id, assignment_id, action_type, params,
                                     last_error, error_kind, retry_count, status, batch_key,
                                     created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.organization_id)
        .bind(&entry.assignment_id)
        .bind(entry.action_type)
        .bind(Json(&entry.params))
        .bind(&entry.last_error)
        .bind(entry.error_kind)
        .bind(entry.retry_count)
        .bind(entry.status)
        .bind(&entry.batch_key)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("写入死信条目 {}", entry.id);
        Ok(())
    }

    async fn get(&self, id: &str) -> BulkOpsResult<Option<DlqEntry>> {
        let row = sqlx::query(&format!("SELECT {DLQ_COLUMNS} FROM dlq_entries WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_by_organization(&self, organization_id: &str) -> BulkOpsResult<Vec<DlqEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {DLQ_COLUMNS} FROM dlq_entries WHERE organization_id = $1 \
             ORDER BY created_at DESC, id"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn update(&self, entry: &DlqEntry) -> BulkOpsResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE dlq_entries
            SET params = $2, last_error = $3, error_kind = $4, retry_count = $5, status = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(&entry.id)
        .bind(Json(&entry.params))
        .bind(&entry.last_error)
        .bind(entry.error_kind)
        .bind(entry.retry_count)
        .bind(entry.status)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BulkOpsError::DlqEntryNotFound {
                id: entry.id.clone(),
            });
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: &str,
        from: DlqStatus,
        to: DlqStatus,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<bool> {
        let result = sqlx::query(
            "UPDATE dlq_entries SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: &str) -> BulkOpsResult<()> {
        let result = sqlx::query("DELETE FROM dlq_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BulkOpsError::DlqEntryNotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> BulkOpsResult<u64> {
        let result = sqlx::query("DELETE FROM dlq_entries WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
