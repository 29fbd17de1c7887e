use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bulkops_core::BulkOpsError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("批量操作错误: {0}")]
    BulkOps(#[from] BulkOpsError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,

    #[error("服务不可用: {0}")]
    Unavailable(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, String, &'static str, Vec<String>) {
        match self {
            ApiError::BulkOps(err) => match err {
                BulkOpsError::EmptyBatch => (
                    StatusCode::BAD_REQUEST,
                    err.to_string(),
                    "EMPTY_BATCH",
                    vec!["target_ids 至少需要包含一个分配ID".to_string()],
                ),
                BulkOpsError::InvalidParams(_) => (
                    StatusCode::BAD_REQUEST,
                    err.to_string(),
                    "INVALID_PARAMS",
                    vec!["请检查 action_type 与 params 是否匹配".to_string()],
                ),
                BulkOpsError::FeatureDisabled { .. } => (
                    StatusCode::FORBIDDEN,
                    err.to_string(),
                    "FEATURE_DISABLED",
                    vec!["请联系管理员为组织开启相应功能".to_string()],
                ),
                BulkOpsError::DuplicateBatch { .. } => (
                    StatusCode::CONFLICT,
                    err.to_string(),
                    "DUPLICATE_BATCH",
                    vec!["相同的批量操作在冷却期内已经执行过".to_string()],
                ),
                BulkOpsError::RateLimitExceeded { .. } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    err.to_string(),
                    "RATE_LIMIT_EXCEEDED",
                    vec![
                        "请减少目标数量或等待下一个配额窗口".to_string(),
                        "升级套餐可以提高配额".to_string(),
                    ],
                ),
                BulkOpsError::AssignmentNotFound { .. } => (
                    StatusCode::NOT_FOUND,
                    err.to_string(),
                    "ASSIGNMENT_NOT_FOUND",
                    vec!["请检查分配ID是否正确".to_string()],
                ),
                BulkOpsError::DlqEntryNotFound { .. } => (
                    StatusCode::NOT_FOUND,
                    err.to_string(),
                    "DLQ_ENTRY_NOT_FOUND",
                    vec![
                        "请检查死信条目ID是否正确".to_string(),
                        "使用 GET /api/organizations/{org_id}/dlq 查看死信队列".to_string(),
                    ],
                ),
                BulkOpsError::DlqEntryNotRetryable { .. } => (
                    StatusCode::CONFLICT,
                    err.to_string(),
                    "DLQ_ENTRY_NOT_RETRYABLE",
                    vec!["只有待处理状态的死信条目可以重试".to_string()],
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "系统内部错误".to_string(),
                    "INTERNAL_ERROR",
                    vec![
                        "系统遇到内部错误，请稍后重试".to_string(),
                        "查看 GET /health 检查系统状态".to_string(),
                    ],
                ),
            },
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
                vec!["请检查请求格式和参数".to_string()],
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
                vec!["请检查请求URL是否正确".to_string()],
            ),
            ApiError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("服务不可用: {msg}"),
                "SERVICE_UNAVAILABLE",
                vec!["请稍后重试".to_string()],
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
                vec![format!("错误详情: {msg}")],
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error_type, suggestions) = self.parts();

        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
