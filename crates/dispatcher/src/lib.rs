//! # BulkOps Dispatcher
//!
//! 批量操作执行管道：幂等守卫、限流器、重试执行器、死信队列和审计记录。

pub mod audit_recorder;
pub mod dlq_service;
pub mod idempotency_guard;
pub mod metrics;
pub mod pipeline;
pub mod rate_limiter;
pub mod retry_executor;

#[cfg(test)]
pub mod test_utils;

pub use audit_recorder::AuditRecorder;
pub use dlq_service::{DlqRetryOutcome, DlqService};
pub use idempotency_guard::IdempotencyGuard;
pub use pipeline::{BulkActionService, PipelineDependencies};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use retry_executor::{BackoffPolicy, ItemOutcome, RetryExecutor};
