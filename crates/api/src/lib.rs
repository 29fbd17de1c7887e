//! # BulkOps API
//!
//! 批量操作服务的 REST 接口，基于 Axum 构建。
//!
//! ## API 端点
//!
//! - `POST /api/organizations/{org_id}/bulk-actions` - 执行批量操作
//! - `GET /api/organizations/{org_id}/dlq` - 死信队列列表
//! - `POST /api/dlq/{id}/retry` - 重试死信条目
//! - `POST /api/dlq/{id}/resolve` - 人工处理死信条目
//! - `GET /api/organizations/{org_id}/audit` - 审计记录
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus 指标（安装了记录器时可用）
//!
//! 错误统一返回 `{"error": {"message", "type", "code", ...}}` 格式，
//! 见 [`error::ApiError`]。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use tower::ServiceBuilder;

pub use routes::AppState;

use crate::middleware::{cors_layer, request_logging, trace_layer};
use crate::routes::create_routes;

/// 创建API应用
pub fn create_app(state: AppState) -> Router {
    create_app_with_cors(state, true)
}

/// 创建API应用，可关闭CORS
pub fn create_app_with_cors(state: AppState, cors_enabled: bool) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
