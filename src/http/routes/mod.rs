//! HTTP 路由模块
//!
//! 路由结构：
//! - `POST /api/captcha/verify`   - Turnstile 验证码校验代理
//! - `GET  /api/security/policy`  - 只读安全策略表
//! - `GET  /health`               - 健康检查
//! - `GET  /metrics`              - Prometheus 指标（未启用时 503）

pub mod captcha;
pub mod health;
pub mod policy;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::http::HttpServerState;
use crate::infra::metrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// 创建所有路由
pub fn create_routes() -> Router<HttpServerState> {
    Router::new()
        .route("/metrics", get(scrape_metrics))
        .merge(health::create_route())
        .merge(captcha::create_route())
        .merge(policy::create_route())
}

async fn scrape_metrics() -> Response {
    match metrics::render_metrics() {
        Some(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled").into_response(),
    }
}
