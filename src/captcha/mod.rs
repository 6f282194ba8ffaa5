//! 验证码校验代理
//!
//! 在服务端把客户端提交的 Turnstile token 转交服务方校验，密钥不离开服务端。
//!
//! 路由挂载见 `http::routes::captcha`。

pub mod provider;
pub mod service;
pub mod types;

pub use provider::{CaptchaProvider, TurnstileProvider};
pub use service::CaptchaVerifyService;
pub use types::{
    CaptchaVerifyRequest, CaptchaVerifyResult, SiteverifyRequest, TurnstileVerifyResponse,
    MAX_TOKEN_LENGTH, TOKEN_MALFORMED, TOKEN_REQUIRED,
};
