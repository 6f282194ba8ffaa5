//! 验证码校验路由
//!
//! 路由：POST /api/captcha/verify

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use tracing::debug;

use crate::captcha::CaptchaVerifyRequest;
use crate::http::client_ip::ClientIp;
use crate::http::HttpServerState;
use crate::infra::metrics;

pub fn create_route() -> Router<HttpServerState> {
    Router::new().route("/api/captcha/verify", post(verify_captcha))
}

/// 验证码校验处理器
///
/// 请求体自行解析：缺失、非 JSON、缺少 token 都按"token 必填"处理，而不是交给 axum 的 Json 拒绝。
async fn verify_captcha(
    State(state): State<HttpServerState>,
    client_ip: ClientIp,
    body: Bytes,
) -> Response {
    let request: CaptchaVerifyRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        debug!("验证码请求体无法解析: {}", e);
        CaptchaVerifyRequest::default()
    });

    match state
        .captcha
        .verify(request.token.as_deref(), client_ip.into_string())
        .await
    {
        Ok(result) => {
            metrics::record_captcha_verification("success");
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => {
            metrics::record_captcha_verification(e.code().as_str());
            e.into_response()
        }
    }
}
