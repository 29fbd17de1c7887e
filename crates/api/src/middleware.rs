//! 请求日志、请求追踪和跨域配置

use std::time::Instant;

use axum::{extract::Request, http::Method, middleware::Next, response::Response};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};

/// 带组织维度的请求追踪层
pub type RequestTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, fn(&Request) -> Span>;

/// 从 `/api/organizations/{org_id}/...` 中取出组织ID
pub fn organization_scope(path: &str) -> Option<&str> {
    path.strip_prefix("/api/organizations/")?
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// 按状态码分级记录请求：5xx 告警，4xx 视为被拒绝的请求
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        warn!(%method, %path, status, elapsed_ms, "请求处理失败");
    } else if response.status().is_client_error() {
        info!(%method, %path, status, elapsed_ms, "请求被拒绝");
    } else {
        info!(%method, %path, status, elapsed_ms, "请求完成");
    }

    response
}

/// 接口只有查询和提交两类操作
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

pub fn trace_layer() -> RequestTraceLayer {
    TraceLayer::new_for_http().make_span_with(request_span as fn(&Request) -> Span)
}

fn request_span(request: &Request) -> Span {
    let path = request.uri().path();
    info_span!(
        "http_request",
        method = %request.method(),
        path = %path,
        organization_id = organization_scope(path).unwrap_or("-"),
    )
}
