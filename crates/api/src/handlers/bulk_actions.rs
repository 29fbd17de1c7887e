use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use bulkops_core::models::{ActionType, BatchRequest, BulkActionParams};

use crate::{error::ApiResult, response::success, routes::AppState};

/// 批量操作请求体，组织ID来自路径
#[derive(Debug, Deserialize)]
pub struct BulkActionRequest {
    pub action_type: ActionType,
    pub target_ids: Vec<String>,
    pub actor_id: String,
    #[serde(default)]
    pub params: BulkActionParams,
}

/// 执行批量操作
///
/// 部分失败仍返回 200，由结果中的计数和 `warnings` 说明。
pub async fn execute_bulk_action(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Json(request): Json<BulkActionRequest>,
) -> ApiResult<impl IntoResponse> {
    let batch = BatchRequest::new(
        request.action_type,
        org_id,
        request.target_ids,
        request.actor_id,
    )
    .with_params(request.params);

    let result = state.service.execute_bulk_action(batch).await?;
    Ok(success(result))
}
