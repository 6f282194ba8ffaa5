//! GET /api/security/policy - 只读策略表

use axum::{extract::State, response::Json, routing::get, Router};

use crate::http::HttpServerState;
use crate::policy::SecurityPolicy;

pub fn create_route() -> Router<HttpServerState> {
    Router::new().route("/api/security/policy", get(get_policy))
}

async fn get_policy(State(state): State<HttpServerState>) -> Json<SecurityPolicy> {
    Json(state.policy.as_ref().clone())
}
