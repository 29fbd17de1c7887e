use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;

use bulkops_core::config::AppConfig;
use bulkops_core::traits::NotificationProvider;
use bulkops_dispatcher::{BulkActionService, PipelineDependencies};
use bulkops_infrastructure::{PlanQuotaService, Repositories};

use crate::handlers::{
    audit::list_audit_records,
    bulk_actions::execute_bulk_action,
    dlq::{get_dlq_entry, list_dlq_entries, resolve_dlq_entry, retry_dlq_entry},
    health::health_check,
    metrics::prometheus_metrics,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BulkActionService>,
    pub repositories: Repositories,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: Arc<BulkActionService>, repositories: Repositories) -> Self {
        Self {
            service,
            repositories,
            metrics_handle: None,
        }
    }

    /// 用仓储、通知服务和配置装配批量操作服务
    pub fn build(
        repositories: Repositories,
        notification_provider: Arc<dyn NotificationProvider>,
        config: &AppConfig,
    ) -> Self {
        let quota_service = Arc::new(PlanQuotaService::new(
            repositories.organizations.clone(),
            repositories.usage.clone(),
            config.rate_limit.clone(),
        ));

        let deps = PipelineDependencies {
            assignments: repositories.assignments.clone(),
            idempotency: repositories.idempotency.clone(),
            dead_letters: repositories.dead_letters.clone(),
            audit: repositories.audit.clone(),
            organizations: repositories.organizations.clone(),
            quota_service,
            notification_provider,
        };

        let service = Arc::new(BulkActionService::new(deps, &config.pipeline));
        Self::new(service, repositories)
    }

    pub fn with_metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查与指标
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        // 批量操作
        .route(
            "/api/organizations/{org_id}/bulk-actions",
            post(execute_bulk_action),
        )
        // 死信队列
        .route("/api/organizations/{org_id}/dlq", get(list_dlq_entries))
        .route("/api/dlq/{id}", get(get_dlq_entry))
        .route("/api/dlq/{id}/retry", post(retry_dlq_entry))
        .route("/api/dlq/{id}/resolve", post(resolve_dlq_entry))
        // 审计
        .route("/api/organizations/{org_id}/audit", get(list_audit_records))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bulkops_infrastructure::LoggingNotificationProvider;

    pub(crate) fn test_state() -> AppState {
        AppState::build(
            Repositories::in_memory(),
            Arc::new(LoggingNotificationProvider::new()),
            &AppConfig::default(),
        )
    }

    #[test]
    fn test_state_has_no_metrics_handle_by_default() {
        let state = test_state();
        assert!(state.metrics_handle.is_none());
        assert_eq!(state.repositories.backend_name(), "memory");
    }
}
