use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use bulkops_dispatcher::DlqRetryOutcome;

use crate::{
    error::{ApiError, ApiResult},
    response::{success, success_with_message, ListResponse},
    routes::AppState,
};

/// 死信重试请求，操作人写入审计记录
#[derive(Debug, Deserialize)]
pub struct RetryDlqRequest {
    pub actor_id: String,
}

/// 获取组织的死信队列
pub async fn list_dlq_entries(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let entries = state.service.list_dlq_entries(&org_id).await?;
    Ok(success(ListResponse::new(entries)))
}

/// 获取单个死信条目
pub async fn get_dlq_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let entry = state.service.get_dlq_entry(&id).await?;
    Ok(success(entry))
}

/// 重试死信条目
pub async fn retry_dlq_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RetryDlqRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.actor_id.trim().is_empty() {
        return Err(ApiError::BadRequest("actor_id 不能为空".to_string()));
    }

    let outcome = state.service.retry_dlq_entry(&id, &request.actor_id).await?;
    let message = match &outcome {
        DlqRetryOutcome::Succeeded { warnings, .. } if !warnings.is_empty() => {
            "重试成功，但部分记录写入失败"
        }
        DlqRetryOutcome::Succeeded { .. } => "重试成功，死信条目已移除",
        DlqRetryOutcome::Failed { .. } => "重试失败，死信条目已标记为失败",
    };
    Ok(success_with_message(outcome, message.to_string()))
}

/// 人工处理死信条目，不再重试
pub async fn resolve_dlq_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let entry = state.service.resolve_dlq_entry(&id).await?;
    Ok(success(entry))
}
