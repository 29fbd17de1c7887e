use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::{
    error::{ApiError, ApiResult},
    routes::AppState,
};

/// 健康检查，存储不可用时返回 503
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if let Err(e) = state.repositories.health_check().await {
        warn!("存储健康检查失败: {:#}", e);
        return Err(ApiError::Unavailable(format!("存储不可用: {e}")));
    }

    Ok(Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "bulkops",
        "storage": state.repositories.backend_name(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}
