use async_trait::async_trait;
use bulkops_core::models::{Assignment, AssignmentStatus};
use bulkops_core::traits::AssignmentRepository;
use bulkops_core::{BulkOpsError, BulkOpsResult};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const ASSIGNMENT_COLUMNS: &str = "id, organization_id, campaign_id, session_id, evaluator_email, \
     evaluator_name, assignment_type, status, invitation_token_hash, invitation_count, deadline, \
     last_invited_at, created_at, updated_at";

pub struct SqliteAssignmentRepository {
    pool: SqlitePool,
}

impl SqliteAssignmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_assignment(row: &sqlx::sqlite::SqliteRow) -> BulkOpsResult<Assignment> {
        Ok(Assignment {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            campaign_id: row.try_get("campaign_id")?,
            session_id: row.try_get("session_id")?,
            evaluator_email: row.try_get("evaluator_email")?,
            evaluator_name: row.try_get("evaluator_name")?,
            assignment_type: row.try_get("assignment_type")?,
            status: row.try_get("status")?,
            invitation_token_hash: row.try_get("invitation_token_hash")?,
            invitation_count: row.try_get("invitation_count")?,
            deadline: row.try_get("deadline")?,
            last_invited_at: row.try_get("last_invited_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl AssignmentRepository for SqliteAssignmentRepository {
    #[instrument(skip(self, assignment), fields(
        assignment_id = %assignment.id,
        organization_id = %assignment.organization_id,
    ))]
    async fn create(&self, assignment: &Assignment) -> BulkOpsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO assignments (id, organization_id, campaign_id, session_id, evaluator_email,
                                     evaluator_name, assignment_type, status, invitation_token_hash,
                                     invitation_count, deadline, last_invited_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&assignment.id)
        .bind(&assignment.organization_id)
        .bind(&assignment.campaign_id)
        .bind(&assignment.session_id)
        .bind(&assignment.evaluator_email)
        .bind(&assignment.evaluator_name)
        .bind(assignment.assignment_type)
        .bind(assignment.status)
        .bind(&assignment.invitation_token_hash)
        .bind(assignment.invitation_count)
        .bind(assignment.deadline)
        .bind(assignment.last_invited_at)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("创建{}", assignment.entity_description());
        Ok(())
    }

    async fn get(&self, organization_id: &str, id: &str) -> BulkOpsResult<Option<Assignment>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_assignment(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, assignment), fields(assignment_id = %assignment.id))]
    async fn update(&self, assignment: &Assignment) -> BulkOpsResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET session_id = $3, evaluator_email = $4, evaluator_name = $5, assignment_type = $6,
                status = $7, invitation_token_hash = $8, invitation_count = $9, deadline = $10,
                last_invited_at = $11, updated_at = $12
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(&assignment.id)
        .bind(&assignment.organization_id)
        .bind(&assignment.session_id)
        .bind(&assignment.evaluator_email)
        .bind(&assignment.evaluator_name)
        .bind(assignment.assignment_type)
        .bind(assignment.status)
        .bind(&assignment.invitation_token_hash)
        .bind(assignment.invitation_count)
        .bind(assignment.deadline)
        .bind(assignment.last_invited_at)
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BulkOpsError::AssignmentNotFound {
                id: assignment.id.clone(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, token_hash))]
    async fn record_invitation(
        &self,
        organization_id: &str,
        id: &str,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<Assignment> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE assignments
            SET invitation_token_hash = $3, invitation_count = invitation_count + 1,
                last_invited_at = $4, updated_at = $4
            WHERE id = $1 AND organization_id = $2 AND status NOT IN ($5, $6)
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .bind(token_hash)
        .bind(now)
        .bind(AssignmentStatus::Completed)
        .bind(AssignmentStatus::Cancelled)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_assignment(&row),
            None => Err(BulkOpsError::AssignmentClosed { id: id.to_string() }),
        }
    }

    #[instrument(skip(self))]
    async fn set_deadline(
        &self,
        organization_id: &str,
        id: &str,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> BulkOpsResult<Assignment> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE assignments
            SET deadline = $3, updated_at = $4
            WHERE id = $1 AND organization_id = $2 AND status NOT IN ($5, $6)
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .bind(deadline)
        .bind(now)
        .bind(AssignmentStatus::Completed)
        .bind(AssignmentStatus::Cancelled)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_assignment(&row),
            None => Err(BulkOpsError::AssignmentClosed { id: id.to_string() }),
        }
    }

    async fn list_by_campaign(
        &self,
        organization_id: &str,
        campaign_id: &str,
    ) -> BulkOpsResult<Vec<Assignment>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments \
             WHERE organization_id = $1 AND campaign_id = $2 ORDER BY id"
        ))
        .bind(organization_id)
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_assignment).collect()
    }
}
