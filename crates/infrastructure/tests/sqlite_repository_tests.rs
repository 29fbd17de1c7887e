use std::sync::Arc;

use bulkops_core::config::{DatabaseConfig, StorageBackend};
use bulkops_core::models::{
    hash_token, issue_invitation_token, ActionType, Assignment, AssignmentStatus, AuditRecord,
    AuditSource, BatchOutcome, BulkActionParams, DlqEntry, DlqStatus, FailedItem, FailureKind,
    FeatureFlags, IdempotencyRecord, IdempotencyStatus, OrganizationSettings, Plan,
};
use bulkops_core::traits::ClaimOutcome;
use bulkops_core::BulkOpsError;
use bulkops_infrastructure::{DatabaseManager, Repositories};
use chrono::{Duration, Utc};
use tempfile::TempDir;

async fn setup_repositories() -> (TempDir, Repositories) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bulkops-test.db");
    let config = DatabaseConfig {
        backend: StorageBackend::Sqlite,
        url: format!("sqlite://{}?mode=rwc", path.display()),
        ..Default::default()
    };

    let repositories = Repositories::from_config(&config).await.unwrap();
    (dir, repositories)
}

fn failed_item(assignment_id: &str) -> FailedItem {
    FailedItem {
        organization_id: "org-1".to_string(),
        assignment_id: assignment_id.to_string(),
        action_type: ActionType::ExtendDeadline,
        params: BulkActionParams {
            custom_message: Some("please finish".to_string()),
            extension_days: Some(7),
        },
        last_error: "provider unavailable".to_string(),
        error_kind: FailureKind::Transient,
        retry_count: 5,
        batch_key: Some("batch-key".to_string()),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        backend: StorageBackend::Sqlite,
        url: format!("sqlite://{}?mode=rwc", dir.path().join("m.db").display()),
        ..Default::default()
    };

    let manager = DatabaseManager::new(&config).await.unwrap();
    manager.migrate().await.unwrap();
    manager.migrate().await.unwrap();
    manager.health_check().await.unwrap();

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' \
         AND name != 'sqlite_sequence' ORDER BY name",
    )
    .fetch_all(manager.pool())
    .await
    .unwrap();
    let names: Vec<String> = tables.into_iter().map(|(name,)| name).collect();

    assert_eq!(
        names,
        vec![
            "assignments",
            "audit_records",
            "dlq_entries",
            "idempotency_records",
            "organization_settings",
            "usage_counters",
        ]
    );
    manager.close().await;
}

#[tokio::test]
async fn test_assignment_roundtrip_and_scope() {
    let (_dir, repos) = setup_repositories().await;
    assert_eq!(repos.backend_name(), "sqlite");

    let deadline = Utc::now() + Duration::days(7);
    let assignment = Assignment::new("a-1", "org-1", "camp-1", "a@example.com", deadline)
        .with_session("session-1");
    repos.assignments.create(&assignment).await.unwrap();

    let loaded = repos.assignments.get("org-1", "a-1").await.unwrap().unwrap();
    assert_eq!(loaded.campaign_id, "camp-1");
    assert_eq!(loaded.status, AssignmentStatus::Pending);
    assert!(repos.assignments.get("org-2", "a-1").await.unwrap().is_none());

    let (token, hash) = issue_invitation_token();
    let now = Utc::now();
    let updated = repos
        .assignments
        .record_invitation("org-1", "a-1", &hash, now)
        .await
        .unwrap();
    assert_eq!(updated.invitation_count, 1);
    assert_eq!(updated.last_invited_at, Some(now));

    repos
        .assignments
        .set_deadline("org-1", "a-1", assignment.extended_deadline(3), now)
        .await
        .unwrap();

    let loaded = repos.assignments.get("org-1", "a-1").await.unwrap().unwrap();
    assert_eq!(loaded.invitation_count, 1);
    assert_eq!(
        loaded.invitation_token_hash.as_deref(),
        Some(hash_token(&token).as_str())
    );
    assert_eq!(loaded.deadline, deadline + Duration::days(3));
    assert_eq!(loaded.session_id, "session-1");
    assert!(matches!(
        repos
            .assignments
            .record_invitation("org-2", "a-1", &hash, now)
            .await,
        Err(BulkOpsError::AssignmentClosed { .. })
    ));

    let missing = Assignment::new("a-404", "org-1", "camp-1", "x@example.com", deadline);
    assert!(matches!(
        repos.assignments.update(&missing).await,
        Err(BulkOpsError::AssignmentNotFound { .. })
    ));

    let listed = repos
        .assignments
        .list_by_campaign("org-1", "camp-1")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_narrow_writes_skip_terminal_assignments() {
    let (_dir, repos) = setup_repositories().await;
    let deadline = Utc::now() + Duration::days(7);
    let assignment = Assignment::new("a-1", "org-1", "camp-1", "a@example.com", deadline);
    repos.assignments.create(&assignment).await.unwrap();

    // 评估者在通知发送期间完成了分配
    let completed = assignment.clone().with_status(AssignmentStatus::Completed);
    repos.assignments.update(&completed).await.unwrap();

    let now = Utc::now();
    let (_, hash) = issue_invitation_token();
    assert!(matches!(
        repos
            .assignments
            .record_invitation("org-1", "a-1", &hash, now)
            .await,
        Err(BulkOpsError::AssignmentClosed { .. })
    ));
    assert!(matches!(
        repos
            .assignments
            .set_deadline("org-1", "a-1", deadline + Duration::days(3), now)
            .await,
        Err(BulkOpsError::AssignmentClosed { .. })
    ));

    let loaded = repos.assignments.get("org-1", "a-1").await.unwrap().unwrap();
    assert_eq!(loaded.status, AssignmentStatus::Completed);
    assert_eq!(loaded.invitation_count, 0);
    assert!(loaded.invitation_token_hash.is_none());
    assert_eq!(loaded.deadline, deadline);
}

#[tokio::test]
async fn test_dlq_transition_is_conditional() {
    let (_dir, repos) = setup_repositories().await;
    let now = Utc::now();
    let entry = DlqEntry::from_failed_item(failed_item("a-1"), now);
    repos.dead_letters.insert(&entry).await.unwrap();

    assert!(repos
        .dead_letters
        .transition(&entry.id, DlqStatus::PendingRetry, DlqStatus::Retrying, now)
        .await
        .unwrap());
    assert!(!repos
        .dead_letters
        .transition(&entry.id, DlqStatus::PendingRetry, DlqStatus::Retrying, now)
        .await
        .unwrap());

    let loaded = repos.dead_letters.get(&entry.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DlqStatus::Retrying);
    assert!(!loaded.is_retryable());
}

#[tokio::test]
async fn test_idempotency_claim_is_conditional() {
    let (_dir, repos) = setup_repositories().await;
    let now = Utc::now();
    let record = IdempotencyRecord::provisional(
        "key-1".to_string(),
        "org-1",
        ActionType::ResendInvitation,
        2,
        now,
        Duration::hours(24),
    );

    assert_eq!(
        repos.idempotency.try_claim(&record, now).await.unwrap(),
        ClaimOutcome::Claimed
    );

    let again = now + Duration::minutes(1);
    match repos.idempotency.try_claim(&record, again).await.unwrap() {
        ClaimOutcome::Existing(existing) => {
            assert_eq!(existing.status, IdempotencyStatus::InProgress);
            assert_eq!(existing.target_count, 2);
        }
        ClaimOutcome::Claimed => panic!("重复占用不应成功"),
    }

    let outcome = BatchOutcome {
        processed: 2,
        succeeded: 1,
        failed: 1,
        dlq_count: 1,
    };
    repos.idempotency.finalize("key-1", outcome).await.unwrap();
    let stored = repos.idempotency.get("key-1").await.unwrap().unwrap();
    assert_eq!(stored.status, IdempotencyStatus::Completed);
    assert_eq!(stored.outcome, Some(outcome));

    // 冷却期结束后允许重新占用
    let later = now + Duration::hours(25);
    let renewed = IdempotencyRecord::provisional(
        "key-1".to_string(),
        "org-1",
        ActionType::ResendInvitation,
        2,
        later,
        Duration::hours(24),
    );
    assert_eq!(
        repos.idempotency.try_claim(&renewed, later).await.unwrap(),
        ClaimOutcome::Claimed
    );
    let stored = repos.idempotency.get("key-1").await.unwrap().unwrap();
    assert_eq!(stored.status, IdempotencyStatus::InProgress);
    assert!(stored.outcome.is_none());

    repos.idempotency.release("key-1").await.unwrap();
    assert!(repos.idempotency.get("key-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_claims_admit_exactly_one() {
    let (_dir, repos) = setup_repositories().await;
    let now = Utc::now();
    let record = Arc::new(IdempotencyRecord::provisional(
        "contended".to_string(),
        "org-1",
        ActionType::ResendInvitation,
        1,
        now,
        Duration::hours(24),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let idempotency = Arc::clone(&repos.idempotency);
        let record = Arc::clone(&record);
        handles.push(tokio::spawn(async move {
            idempotency.try_claim(&record, now).await
        }));
    }

    let mut claimed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == ClaimOutcome::Claimed {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 1);
}

#[tokio::test]
async fn test_dead_letter_lifecycle() {
    let (_dir, repos) = setup_repositories().await;
    let now = Utc::now();

    let older = DlqEntry::from_failed_item(failed_item("a-1"), now - Duration::minutes(5));
    let newer = DlqEntry::from_failed_item(failed_item("a-2"), now);
    repos.dead_letters.insert(&older).await.unwrap();
    repos.dead_letters.insert(&newer).await.unwrap();

    let listed = repos.dead_letters.list_by_organization("org-1").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].params.extension_days, Some(7));
    assert!(repos
        .dead_letters
        .list_by_organization("org-2")
        .await
        .unwrap()
        .is_empty());

    let mut updated = older.clone();
    updated.mark_failed("still failing".to_string(), 1, now);
    repos.dead_letters.update(&updated).await.unwrap();
    let loaded = repos.dead_letters.get(&older.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DlqStatus::Failed);
    assert_eq!(loaded.last_error, "still failing");

    repos.dead_letters.delete(&newer.id).await.unwrap();
    assert!(matches!(
        repos.dead_letters.delete(&newer.id).await,
        Err(BulkOpsError::DlqEntryNotFound { .. })
    ));

    assert_eq!(
        repos
            .dead_letters
            .purge_older_than(now - Duration::minutes(1))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_audit_records_newest_first() {
    let (_dir, repos) = setup_repositories().await;
    let outcome = BatchOutcome {
        processed: 3,
        succeeded: 3,
        failed: 0,
        dlq_count: 0,
    };

    for i in 0..3 {
        let record = AuditRecord::new(
            &format!("actor-{i}"),
            ActionType::ResendInvitation,
            "org-1",
            Some("camp-1".to_string()),
            AuditSource::Batch,
            outcome,
        );
        repos.audit.append(&record).await.unwrap();
    }

    let all = repos.audit.list_by_organization("org-1", None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].actor_id, "actor-2");
    assert_eq!(all[0].affected_count, 3);

    let limited = repos.audit.list_by_organization("org-1", Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_organization_settings_and_usage() {
    let (_dir, repos) = setup_repositories().await;
    assert!(repos.organizations.get_settings("org-1").await.unwrap().is_none());

    let settings = OrganizationSettings::defaults_for("org-1")
        .with_plan(Plan::Professional)
        .with_flags(FeatureFlags {
            bulk_actions: true,
            deadline_extension: false,
            custom_messages: true,
        });
    repos.organizations.upsert_settings(&settings).await.unwrap();
    let loaded = repos.organizations.get_settings("org-1").await.unwrap().unwrap();
    assert_eq!(loaded.plan, Plan::Professional);
    assert!(!loaded.feature_flags.deadline_extension);
    assert!(loaded.feature_flags.custom_messages);

    let window = Utc::now();
    assert_eq!(repos.usage.get_usage("org-1", window).await.unwrap(), 0);
    assert_eq!(repos.usage.increment("org-1", window, 4).await.unwrap(), 4);
    assert_eq!(repos.usage.increment("org-1", window, 1).await.unwrap(), 5);
    assert_eq!(repos.usage.get_usage("org-1", window).await.unwrap(), 5);
}
