//! # 数据模型
//!
//! 定义批量操作管道的核心数据结构：评估分配、批量请求、幂等记录、
//! 死信条目、审计记录以及组织配置。
//!
//! ## 核心模型
//!
//! ### Assignment - 评估分配
//! 一名评估者对一次评估的完成义务。管道只修改邀请令牌、邀请次数、
//! 截止时间等与状态相邻的字段。
//!
//! ### BatchRequest / BatchResult - 批量调用
//! 一次批量操作的输入与按计数汇总的输出，部分成功是正常结果。
//!
//! ### IdempotencyRecord - 幂等记录
//! 冷却窗口内占用一个批次指纹，过期后才可被新的批次覆盖。
//!
//! ### DlqEntry - 死信条目
//! 永久失败或重试耗尽的单个分配，等待人工重试或处理。
//!
//! ### AuditRecord - 审计记录
//! 每个批次执行完成后写入一条，不可修改。
//!
//! ## 设计原则
//!
//! - 所有时间字段使用 `DateTime<Utc>`
//! - 状态字段使用枚举类型，数据库中以小写字符串存储，解码时拒绝未知取值
//! - 组织配置作为显式参数传递，不使用全局状态

mod sqlx_impls;

pub mod assignment;
pub mod audit;
pub mod batch;
pub mod dlq;
pub mod idempotency;
pub mod organization;

pub use assignment::{
    hash_token, issue_invitation_token, Assignment, AssignmentStatus, AssignmentType,
};
pub use audit::{AuditRecord, AuditSource};
pub use batch::{
    ActionType, BatchOutcome, BatchRequest, BatchResult, BulkActionParams, OperationalWarning,
    MAX_CUSTOM_MESSAGE_LEN, MAX_EXTENSION_DAYS,
};
pub use dlq::{DlqEntry, DlqStatus, FailedItem, FailureKind};
pub use idempotency::{compute_idempotency_key, IdempotencyRecord, IdempotencyStatus};
pub use organization::{FeatureFlags, OrganizationSettings, Plan, QuotaSnapshot};
