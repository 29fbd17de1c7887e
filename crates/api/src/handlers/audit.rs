use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    response::{success, ListResponse},
    routes::AppState,
};

const MAX_AUDIT_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub limit: Option<i64>,
}

/// 获取组织的审计记录，最新的在前
pub async fn list_audit_records(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<impl IntoResponse> {
    if let Some(limit) = params.limit {
        if !(1..=MAX_AUDIT_LIMIT).contains(&limit) {
            return Err(ApiError::BadRequest(format!(
                "limit 必须在 1 到 {MAX_AUDIT_LIMIT} 之间"
            )));
        }
    }

    let records = state
        .service
        .list_audit_records(&org_id, params.limit)
        .await?;
    Ok(success(ListResponse::new(records)))
}
