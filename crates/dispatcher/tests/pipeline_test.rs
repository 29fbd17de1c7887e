mod common;

use std::time::Duration;

use bulkops_core::{
    models::{
        ActionType, AssignmentStatus, AuditSource, BatchRequest, BulkActionParams, DlqStatus,
        FailureKind, FeatureFlags, OperationalWarning, OrganizationSettings, Plan,
    },
    traits::{AuditRepository, DeadLetterRepository, QuotaService},
    BulkOpsError, NotificationError,
};
use tokio::time::Instant;

use common::{assignment, Harness, ACTOR, CAMPAIGN, ORG};

fn resend(ids: &[String]) -> BatchRequest {
    BatchRequest::new(ActionType::ResendInvitation, ORG, ids.to_vec(), ACTOR)
}

fn extend(ids: &[String], days: u32) -> BatchRequest {
    BatchRequest::new(ActionType::ExtendDeadline, ORG, ids.to_vec(), ACTOR).with_params(
        BulkActionParams {
            extension_days: Some(days),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_mixed_batch_with_invalid_recipient() {
    let harness = Harness::new().await;
    let mut ids = harness.seed(&["a-1", "a-2", "a-3", "a-4"]).await;
    harness
        .seed_assignment(assignment("a-5", "not-an-email"))
        .await;
    ids.push("a-5".to_string());

    let result = harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();

    assert_eq!(
        (result.processed, result.succeeded, result.failed, result.dlq_count),
        (5, 4, 1, 1)
    );
    assert_eq!(result.processed, result.succeeded + result.failed);
    assert!(result.failed >= result.dlq_count);
    assert!(result.warnings.is_empty());

    for id in &ids[..4] {
        let assignment = harness.load(id).await;
        assert_eq!(assignment.invitation_count, 1);
        assert!(assignment.invitation_token_hash.is_some());
        assert!(assignment.last_invited_at.is_some());
    }
    let invalid = harness.load("a-5").await;
    assert_eq!(invalid.invitation_count, 0);
    // 永久错误不会调用通知服务，也不会重试
    assert!(harness.provider.calls_for("a-5").is_empty());

    let entries = harness.service.list_dlq_entries(ORG).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].assignment_id, "a-5");
    assert_eq!(entries[0].error_kind, FailureKind::Permanent);
    assert_eq!(entries[0].status, DlqStatus::PendingRetry);
    assert_eq!(entries[0].retry_count, 1);

    let audit = harness.service.list_audit_records(ORG, None).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(Some(audit[0].id.clone()), result.audit_record_id);
    assert_eq!(audit[0].affected_count, 5);
    assert_eq!(audit[0].succeeded_count, 4);
    assert_eq!(audit[0].failed_count, 1);
    assert_eq!(audit[0].dlq_count, 1);
    assert_eq!(audit[0].campaign_id.as_deref(), Some(CAMPAIGN));
    assert_eq!(audit[0].source, AuditSource::Batch);
}

#[tokio::test]
async fn test_resubmission_is_rejected_without_changes() {
    let harness = Harness::new().await;
    let mut ids = harness.seed(&["a-1", "a-2", "a-3", "a-4"]).await;
    harness
        .seed_assignment(assignment("a-5", "not-an-email"))
        .await;
    ids.push("a-5".to_string());

    harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();
    let before = harness.snapshot(&ids).await;
    let calls_before = harness.provider.total_calls();

    let mut reordered = ids.clone();
    reordered.reverse();
    let result = harness.service.execute_bulk_action(resend(&reordered)).await;
    assert!(matches!(result, Err(BulkOpsError::DuplicateBatch { .. })));

    assert_eq!(harness.snapshot(&ids).await, before);
    assert_eq!(harness.provider.total_calls(), calls_before);
    assert_eq!(harness.audit.count().await, 1);
    assert_eq!(harness.dead_letters.count().await, 1);
}

#[tokio::test]
async fn test_different_action_on_same_targets_is_not_duplicate() {
    let harness = Harness::new().await;
    let ids = harness.seed(&["a-1", "a-2"]).await;

    harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();
    let result = harness
        .service
        .execute_bulk_action(extend(&ids, 3))
        .await
        .unwrap();
    assert_eq!(result.succeeded, 2);
}

#[tokio::test(start_paused = true)]
async fn test_always_transient_item_exhausts_backoff() {
    let harness = Harness::new().await;
    let ids = harness.seed(&["a-1"]).await;
    harness
        .provider
        .fail_always("a-1", NotificationError::Transient("503".to_string()));

    let started = Instant::now();
    let result = harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(15));

    assert_eq!((result.succeeded, result.failed, result.dlq_count), (0, 1, 1));

    let calls = harness.provider.calls_for("a-1");
    assert_eq!(calls.len(), 5);
    let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ]
    );

    let entries = harness.service.list_dlq_entries(ORG).await.unwrap();
    assert_eq!(entries[0].error_kind, FailureKind::Transient);
    assert_eq!(entries[0].retry_count, 5);
    assert!(entries[0].last_error.contains("503"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers_within_budget() {
    let harness = Harness::new().await;
    let ids = harness.seed(&["a-1", "a-2"]).await;
    harness
        .provider
        .fail_times("a-1", 2, NotificationError::Transient("429".to_string()));

    let result = harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();

    assert_eq!((result.succeeded, result.failed, result.dlq_count), (2, 0, 0));
    assert_eq!(harness.provider.calls_for("a-1").len(), 3);
    // 每次尝试都会重新生成令牌，只有成功的那次被持久化
    assert_eq!(harness.load("a-1").await.invitation_count, 1);
    assert_eq!(harness.dead_letters.count().await, 0);
}

#[tokio::test]
async fn test_provider_permanent_error_skips_retry() {
    let harness = Harness::new().await;
    let ids = harness.seed(&["a-1"]).await;
    harness
        .provider
        .fail_always("a-1", NotificationError::Permanent("mailbox closed".to_string()));

    let result = harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();

    assert_eq!(result.dlq_count, 1);
    assert_eq!(harness.provider.calls_for("a-1").len(), 1);
    assert_eq!(harness.load("a-1").await.invitation_count, 0);
}

#[tokio::test]
async fn test_quota_lookup_failure_fails_open() {
    let harness = Harness::builder().failing_quota().build().await;
    let ids = harness.seed(&["a-1", "a-2", "a-3"]).await;

    let result = harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();

    assert!(result.succeeded > 0);
    assert_eq!(result.succeeded, 3);
    assert!(matches!(
        result.warnings.as_slice(),
        [OperationalWarning::QuotaLookupFailed { .. }]
    ));
}

#[tokio::test]
async fn test_rate_limit_rejection_has_no_side_effects() {
    let harness = Harness::new().await;
    let ids = harness.seed(&["a-1", "a-2", "a-3"]).await;
    // 免费套餐每小时 50 条
    harness.quota.record_usage(ORG, 48).await.unwrap();
    let before = harness.snapshot(&ids).await;

    let result = harness.service.execute_bulk_action(resend(&ids)).await;
    match result {
        Err(BulkOpsError::RateLimitExceeded {
            limit,
            used,
            requested,
            ..
        }) => assert_eq!((limit, used, requested), (50, 48, 3)),
        other => panic!("期望超出配额错误, 实际: {other:?}"),
    }

    assert_eq!(harness.snapshot(&ids).await, before);
    assert_eq!(harness.provider.total_calls(), 0);
    assert_eq!(harness.audit.count().await, 0);
    // 被拒绝的批次会释放幂等占用
    assert_eq!(harness.idempotency.count().await, 0);
}

#[tokio::test]
async fn test_usage_counts_accepted_notifications() {
    let harness = Harness::builder()
        .settings(OrganizationSettings::defaults_for(ORG).with_plan(Plan::Starter))
        .build()
        .await;
    let mut ids = harness.seed(&["a-1", "a-2", "a-3"]).await;
    harness
        .seed_assignment(assignment("a-4", "broken"))
        .await;
    ids.push("a-4".to_string());

    harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();

    let snapshot = harness.quota.snapshot(ORG).await.unwrap();
    assert_eq!(snapshot.limit, 500);
    assert_eq!(snapshot.used, 3);
}

#[tokio::test]
async fn test_duplicate_targets_processed_once() {
    let harness = Harness::new().await;
    harness.seed(&["a-1", "a-2"]).await;
    let ids = vec!["a-1".to_string(), "a-2".to_string(), "a-1".to_string()];

    let result = harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();

    assert_eq!(result.processed, 2);
    assert_eq!(harness.load("a-1").await.invitation_count, 1);
}

#[tokio::test]
async fn test_extend_deadline() {
    let harness = Harness::new().await;
    let ids = harness.seed(&["a-1", "a-2"]).await;
    let before = harness.load("a-1").await.deadline;

    let result = harness
        .service
        .execute_bulk_action(extend(&ids, 7))
        .await
        .unwrap();

    assert_eq!(result.succeeded, 2);
    assert_eq!(
        harness.load("a-1").await.deadline,
        before + chrono::Duration::days(7)
    );
    assert_eq!(harness.load("a-1").await.invitation_count, 0);
}

#[tokio::test]
async fn test_terminal_and_foreign_assignments_go_to_dlq() {
    let harness = Harness::new().await;
    harness
        .seed_assignment(
            assignment("done", "done@example.com").with_status(AssignmentStatus::Completed),
        )
        .await;
    let mut foreign = assignment("foreign", "f@example.com");
    foreign.organization_id = "org-2".to_string();
    harness.seed_assignment(foreign).await;
    let ids = vec![
        "done".to_string(),
        "foreign".to_string(),
        "missing".to_string(),
    ];

    let result = harness
        .service
        .execute_bulk_action(extend(&ids, 2))
        .await
        .unwrap();

    assert_eq!((result.processed, result.failed, result.dlq_count), (3, 3, 3));
    assert_eq!(harness.provider.total_calls(), 0);
    let entries = harness.service.list_dlq_entries(ORG).await.unwrap();
    assert!(entries
        .iter()
        .all(|entry| entry.error_kind == FailureKind::Permanent));

    let audit = harness.service.list_audit_records(ORG, None).await.unwrap();
    assert_eq!(audit[0].campaign_id, None);
}

#[tokio::test]
async fn test_feature_flags_reject_before_dispatch() {
    let harness = Harness::builder()
        .settings(OrganizationSettings::defaults_for(ORG).with_flags(FeatureFlags {
            bulk_actions: true,
            deadline_extension: false,
            custom_messages: false,
        }))
        .build()
        .await;
    let ids = harness.seed(&["a-1"]).await;

    let result = harness.service.execute_bulk_action(extend(&ids, 3)).await;
    assert!(matches!(result, Err(BulkOpsError::FeatureDisabled { .. })));

    let with_message = resend(&ids).with_params(BulkActionParams {
        custom_message: Some("请尽快完成评估".to_string()),
        ..Default::default()
    });
    let result = harness.service.execute_bulk_action(with_message).await;
    assert!(matches!(result, Err(BulkOpsError::FeatureDisabled { .. })));

    assert_eq!(harness.idempotency.count().await, 0);
    assert_eq!(harness.provider.total_calls(), 0);
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let harness = Harness::new().await;
    let result = harness.service.execute_bulk_action(resend(&[])).await;
    assert!(matches!(result, Err(BulkOpsError::EmptyBatch)));
    assert_eq!(harness.idempotency.count().await, 0);
}

#[tokio::test]
async fn test_dlq_write_failure_surfaces_warning() {
    let harness = Harness::builder().failing_dlq().build().await;
    let mut ids = harness.seed(&["a-1"]).await;
    harness.seed_assignment(assignment("a-2", "nope")).await;
    ids.push("a-2".to_string());

    let result = harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();

    assert_eq!((result.processed, result.succeeded, result.failed, result.dlq_count), (2, 1, 1, 0));
    assert!(matches!(
        result.warnings.as_slice(),
        [OperationalWarning::DlqWriteFailed { assignment_id, .. }] if assignment_id == "a-2"
    ));
}

#[tokio::test]
async fn test_audit_write_failure_keeps_mutations() {
    let harness = Harness::builder().failing_audit().build().await;
    let ids = harness.seed(&["a-1", "a-2"]).await;

    let result = harness
        .service
        .execute_bulk_action(resend(&ids))
        .await
        .unwrap();

    assert_eq!(result.succeeded, 2);
    assert!(result.audit_record_id.is_none());
    assert!(matches!(
        result.warnings.as_slice(),
        [OperationalWarning::AuditWriteFailed { .. }]
    ));
    assert_eq!(harness.load("a-1").await.invitation_count, 1);
}

#[tokio::test]
async fn test_concurrent_identical_batches_run_once() {
    let harness = Harness::new().await;
    let ids = harness.seed(&["a-1", "a-2", "a-3"]).await;

    let first = {
        let service = harness.service.clone();
        let request = resend(&ids);
        tokio::spawn(async move { service.execute_bulk_action(request).await })
    };
    let second = {
        let service = harness.service.clone();
        let request = resend(&ids);
        tokio::spawn(async move { service.execute_bulk_action(request).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(BulkOpsError::DuplicateBatch { .. })))
        .count();

    assert_eq!((succeeded, duplicates), (1, 1));
    assert_eq!(harness.load("a-1").await.invitation_count, 1);
    assert_eq!(harness.audit.list_by_organization(ORG, None).await.unwrap().len(), 1);
    assert_eq!(harness.dead_letters.list_by_organization(ORG).await.unwrap().len(), 0);
}
