//! GET /health

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

use crate::http::HttpServerState;

pub fn create_route() -> Router<HttpServerState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<HttpServerState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "captcha_configured": state.captcha.is_configured(),
        "policy_version": state.policy.version,
    }))
}
