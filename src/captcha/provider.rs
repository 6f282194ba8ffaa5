use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::error::{GuardError, Result};
use crate::infra::metrics;

use super::types::{SiteverifyRequest, TurnstileVerifyResponse};

/// 验证码服务提供方
#[async_trait]
pub trait CaptchaProvider: Send + Sync {
    /// 提交 token 给服务方校验
    ///
    /// 服务方返回 `success: false` 不是错误；只有网络失败、非 2xx、响应无法解析才返回 Err。
    async fn siteverify(&self, request: &SiteverifyRequest) -> Result<TurnstileVerifyResponse>;

    fn name(&self) -> &'static str;
}

/// Cloudflare Turnstile
pub struct TurnstileProvider {
    client: Client,
    verify_url: String,
}

impl TurnstileProvider {
    pub fn new(verify_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GuardError::Configuration(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            verify_url: verify_url.into(),
        })
    }
}

#[async_trait]
impl CaptchaProvider for TurnstileProvider {
    async fn siteverify(&self, request: &SiteverifyRequest) -> Result<TurnstileVerifyResponse> {
        debug!(
            "[Turnstile] siteverify: remoteip={}",
            request.remoteip.as_deref().unwrap_or("-")
        );

        let started = Instant::now();
        let response = self
            .client
            .post(&self.verify_url)
            .form(request)
            .send()
            .await;
        metrics::record_upstream_latency("turnstile", started.elapsed().as_secs_f64());

        let response = response?;
        let status = response.status();
        if !status.is_success() {
            error!(
                "[Turnstile] API error: status={}, reason={}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown")
            );
            return Err(GuardError::UpstreamUnavailable(format!(
                "turnstile returned {}",
                status
            )));
        }

        let body = response.bytes().await?;
        let payload: TurnstileVerifyResponse = serde_json::from_slice(&body)?;
        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "turnstile"
    }
}
