use async_trait::async_trait;
use bulkops_core::models::{FeatureFlags, OrganizationSettings};
use bulkops_core::traits::{OrganizationRepository, UsageRepository};
use bulkops_core::BulkOpsResult;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub struct SqliteOrganizationRepository {
    pool: SqlitePool,
}

impl SqliteOrganizationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_settings(row: &sqlx::sqlite::SqliteRow) -> BulkOpsResult<OrganizationSettings> {
        Ok(OrganizationSettings {
            organization_id: row.try_get("organization_id")?,
            plan: row.try_get("plan")?,
            feature_flags: FeatureFlags {
                bulk_actions: row.try_get("bulk_actions")?,
                deadline_extension: row.try_get("deadline_extension")?,
                custom_messages: row.try_get("custom_messages")?,
            },
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl OrganizationRepository for SqliteOrganizationRepository {
    async fn get_settings(
        &self,
        organization_id: &str,
    ) -> BulkOpsResult<Option<OrganizationSettings>> {
        let row = sqlx::query(
            "SELECT organization_id, plan, bulk_actions, deadline_extension, custom_messages, \
                    updated_at \
             FROM organization_settings WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_settings(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_settings(&self, settings: &OrganizationSettings) -> BulkOpsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organization_settings (organization_id, plan, bulk_actions,
                                               deadline_extension, custom_messages, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (organization_id) DO UPDATE SET
                plan = excluded.plan,
                bulk_actions = excluded.bulk_actions,
                deadline_extension = excluded.deadline_extension,
                custom_messages = excluded.custom_messages,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&settings.organization_id)
        .bind(settings.plan)
        .bind(settings.feature_flags.bulk_actions)
        .bind(settings.feature_flags.deadline_extension)
        .bind(settings.feature_flags.custom_messages)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// 按组织和时间窗口累计的配额用量
pub struct SqliteUsageRepository {
    pool: SqlitePool,
}

impl SqliteUsageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for SqliteUsageRepository {
    async fn get_usage(
        &self,
        organization_id: &str,
        window_start: DateTime<Utc>,
    ) -> BulkOpsResult<u64> {
        let used: Option<i64> = sqlx::query_scalar(
            "SELECT used FROM usage_counters WHERE organization_id = $1 AND window_start = $2",
        )
        .bind(organization_id)
        .bind(window_start)
        .fetch_optional(&self.pool)
        .await?;
        Ok(used.unwrap_or(0).max(0) as u64)
    }

    async fn increment(
        &self,
        organization_id: &str,
        window_start: DateTime<Utc>,
        amount: u64,
    ) -> BulkOpsResult<u64> {
        let used: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO usage_counters (organization_id, window_start, used)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, window_start) DO UPDATE SET
                used = usage_counters.used + excluded.used
            RETURNING used
            "#,
        )
        .bind(organization_id)
        .bind(window_start)
        .bind(amount as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(used.max(0) as u64)
    }
}
