//! 安全网关客户端
//!
//! 把 email、设备指纹和注册标记提交给外部决策服务（`POST /api/security/check`），
//! 并把回答规范化为放行/拒绝结论。决策服务是唯一有权放行的一方。

pub mod client;
pub mod types;

pub use client::SecurityGateClient;
pub use types::{
    SecurityCheckRequest, SecurityCheckResult, SecurityCheckType, DEFAULT_DENIAL_REASON,
    EMAIL_REQUIRED_REASON, UNAVAILABLE_REASON,
};
