#[cfg(test)]
pub mod mocks {
    pub use bulkops_infrastructure::{InMemoryDeadLetterRepository, InMemoryIdempotencyRepository};

    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use bulkops_core::{models::QuotaSnapshot, traits::QuotaService, BulkOpsError, BulkOpsResult};
    use chrono::Utc;

    /// 固定上限的配额服务
    #[derive(Debug)]
    pub struct FixedQuotaService {
        limit: u64,
        used: AtomicU64,
    }

    impl FixedQuotaService {
        pub fn new(limit: u64, used: u64) -> Self {
            Self {
                limit,
                used: AtomicU64::new(used),
            }
        }

        pub fn used(&self) -> u64 {
            self.used.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuotaService for FixedQuotaService {
        async fn snapshot(&self, _organization_id: &str) -> BulkOpsResult<QuotaSnapshot> {
            Ok(QuotaSnapshot {
                limit: self.limit,
                used: self.used(),
                window_start: Utc::now(),
            })
        }

        async fn record_usage(&self, _organization_id: &str, count: u64) -> BulkOpsResult<()> {
            self.used.fetch_add(count, Ordering::SeqCst);
            Ok(())
        }
    }

    /// 总是失败的配额服务
    #[derive(Debug, Clone, Copy)]
    pub struct FailingQuotaService;

    #[async_trait]
    impl QuotaService for FailingQuotaService {
        async fn snapshot(&self, _organization_id: &str) -> BulkOpsResult<QuotaSnapshot> {
            Err(BulkOpsError::Quota("quota backend unavailable".to_string()))
        }

        async fn record_usage(&self, _organization_id: &str, _count: u64) -> BulkOpsResult<()> {
            Err(BulkOpsError::Quota("quota backend unavailable".to_string()))
        }
    }
}
