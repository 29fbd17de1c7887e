//! 批量操作管道指标
//!
//! 通过 `metrics` 门面记录，未安装 recorder 时调用是空操作。

use metrics::{counter, describe_counter, describe_histogram, histogram};

use bulkops_core::models::ActionType;

/// 批次计数
pub const BATCHES_TOTAL: &str = "bulkops_batches_total";

/// 单项执行结果计数
pub const ITEMS_TOTAL: &str = "bulkops_items_total";

/// 写入死信队列的条目数
pub const DLQ_ENTRIES_TOTAL: &str = "bulkops_dlq_entries_total";

/// 配额查询失败后放行的次数
pub const RATE_LIMIT_FAIL_OPEN_TOTAL: &str = "bulkops_rate_limit_fail_open_total";

/// 审计记录写入失败次数
pub const AUDIT_WRITE_FAILURES_TOTAL: &str = "bulkops_audit_write_failures_total";

/// 批次执行耗时
pub const BATCH_DURATION: &str = "bulkops_batch_duration_seconds";

pub fn register_metrics() {
    describe_counter!(BATCHES_TOTAL, "Bulk action batches by action and outcome");
    describe_counter!(ITEMS_TOTAL, "Bulk action items by action and result");
    describe_counter!(DLQ_ENTRIES_TOTAL, "Items routed to the dead-letter queue");
    describe_counter!(
        RATE_LIMIT_FAIL_OPEN_TOTAL,
        "Batches admitted because the quota lookup failed"
    );
    describe_counter!(AUDIT_WRITE_FAILURES_TOTAL, "Audit record write failures");
    describe_histogram!(BATCH_DURATION, "Duration of executed batches in seconds");
}

pub fn record_batch(action: ActionType, outcome: &'static str) {
    counter!(BATCHES_TOTAL, "action" => action.as_str(), "outcome" => outcome).increment(1);
}

pub fn record_batch_duration(action: ActionType, duration_secs: f64) {
    histogram!(BATCH_DURATION, "action" => action.as_str()).record(duration_secs);
}

pub fn record_item(action: ActionType, result: &'static str) {
    counter!(ITEMS_TOTAL, "action" => action.as_str(), "result" => result).increment(1);
}

pub fn record_dlq_entry() {
    counter!(DLQ_ENTRIES_TOTAL).increment(1);
}

pub fn record_rate_limit_fail_open() {
    counter!(RATE_LIMIT_FAIL_OPEN_TOTAL).increment(1);
}

pub fn record_audit_write_failure() {
    counter!(AUDIT_WRITE_FAILURES_TOTAL).increment(1);
}
