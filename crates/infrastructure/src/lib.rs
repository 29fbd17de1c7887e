//! # BulkOps Infrastructure
//!
//! 仓储接口的内存与 SQLite 实现、通知服务、配额服务以及后台维护任务。

pub mod database;
pub mod maintenance_service;
pub mod notification;
pub mod quota_service;
pub mod repositories;

pub use database::*;
pub use maintenance_service::{MaintenanceService, MaintenanceStats};
pub use notification::{
    create_notification_provider, LoggingNotificationProvider, WebhookNotificationProvider,
};
pub use quota_service::PlanQuotaService;
pub use repositories::Repositories;
