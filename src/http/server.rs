//! HTTP 服务器 - 使用 Axum 提供验证码代理和策略接口

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::captcha::CaptchaVerifyService;
use crate::error::{GuardError, ErrorResponse};
use crate::http::routes;
use crate::policy::SecurityPolicy;

/// HTTP 服务器共享状态（成员均为只读）
#[derive(Clone)]
pub struct HttpServerState {
    pub captcha: Arc<CaptchaVerifyService>,
    pub policy: Arc<SecurityPolicy>,
}

/// 构建完整路由（测试中可直接使用）
pub fn create_router(state: HttpServerState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// 处理器 panic 时返回通用失败，不泄露内部信息
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("💥 请求处理 panic: {}", detail);

    let body = ErrorResponse::new(&GuardError::Internal(detail));
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// HTTP 服务器
pub struct HttpServer {
    state: HttpServerState,
    bind_address: String,
}

impl HttpServer {
    pub fn new(state: HttpServerState, bind_address: impl Into<String>) -> Self {
        Self {
            state,
            bind_address: bind_address.into(),
        }
    }

    /// 启动 HTTP 服务器，收到 Ctrl+C 后优雅退出
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = create_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!("🌐 HTTP 服务器启动在 {}", listener.local_addr()?);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        info!("👋 HTTP 服务器已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ 无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
}
