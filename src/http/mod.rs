//! HTTP 服务器模块 - 使用 Axum 提供安全网关 API
//!
//! 功能包括：
//! - Turnstile 验证码校验代理
//! - 只读安全策略接口
//! - 健康检查与 Prometheus 指标

pub mod client_ip;
pub mod routes;
pub mod server;

pub use client_ip::ClientIp;
pub use server::{create_router, HttpServer, HttpServerState};
