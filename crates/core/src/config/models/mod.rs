pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod notification;
pub mod pipeline;

pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::{DatabaseConfig, StorageBackend};
pub use notification::{NotificationConfig, NotificationProviderKind};
pub use pipeline::{
    DlqConfig, MaintenanceConfig, PipelineConfig, PlanQuotas, RateLimitConfig, RetryConfig,
    MAX_IDEMPOTENCY_COOLDOWN_SECONDS,
};
