use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SecretString;
use crate::error::{GuardError, Result};

use super::provider::CaptchaProvider;
use super::types::{
    CaptchaVerifyResult, SiteverifyRequest, MAX_TOKEN_LENGTH, TOKEN_MALFORMED, TOKEN_REQUIRED,
};

/// 验证码校验服务
///
/// 状态机是线性的：输入校验 → 密钥检查 → 上游校验 → 结果。每一步失败都直接终止，不重试。
/// 只有服务方的校验结果决定 `success`。
pub struct CaptchaVerifyService {
    provider: Arc<dyn CaptchaProvider>,
    secret: Option<SecretString>,
    forward_remote_ip: bool,
}

impl CaptchaVerifyService {
    pub fn new(provider: Arc<dyn CaptchaProvider>, secret: Option<SecretString>) -> Self {
        Self {
            provider,
            secret,
            forward_remote_ip: true,
        }
    }

    pub fn with_forward_remote_ip(mut self, forward: bool) -> Self {
        self.forward_remote_ip = forward;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// 校验 token
    pub async fn verify(
        &self,
        token: Option<&str>,
        remote_ip: Option<String>,
    ) -> Result<CaptchaVerifyResult> {
        let token = validate_token(token)?;

        let Some(secret) = &self.secret else {
            error!("❌ Cloudflare Turnstile secret key not configured");
            return Err(GuardError::Configuration(
                "turnstile secret key not configured".to_string(),
            ));
        };

        let request = SiteverifyRequest {
            secret: secret.expose().to_string(),
            response: token.to_string(),
            remoteip: if self.forward_remote_ip { remote_ip } else { None },
            idempotency_key: Some(Uuid::new_v4().to_string()),
        };

        let response = match self.provider.siteverify(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("❌ [{}] 验证码校验请求失败: {}", self.provider.name(), e);
                return Err(e);
            }
        };

        if !response.success {
            warn!(
                "🚫 [{}] 验证码校验未通过: {:?}",
                self.provider.name(),
                response.error_codes
            );
            return Err(GuardError::UpstreamRejected {
                error_codes: response.error_codes,
            });
        }

        info!(
            "✅ [{}] 验证码校验通过: hostname={}",
            self.provider.name(),
            response.hostname.as_deref().unwrap_or("-")
        );
        if let Some(challenged_at) = response.challenge_time() {
            debug!(
                "⏱️ challenge 距今 {}s",
                (Utc::now() - challenged_at).num_seconds()
            );
        }
        Ok(CaptchaVerifyResult::from(response))
    }
}

/// 校验 token：空白视为缺失，长度按字符计；通过的 token 原样转发
fn validate_token(token: Option<&str>) -> Result<&str> {
    let token = token.unwrap_or_default();
    if token.trim().is_empty() {
        return Err(GuardError::ClientInput(TOKEN_REQUIRED.to_string()));
    }
    if token.chars().count() > MAX_TOKEN_LENGTH {
        return Err(GuardError::ClientInput(TOKEN_MALFORMED.to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_token() {
        assert!(matches!(validate_token(None), Err(GuardError::ClientInput(m)) if m == TOKEN_REQUIRED));
        assert!(matches!(validate_token(Some("")), Err(GuardError::ClientInput(_))));
        assert!(matches!(validate_token(Some("  \n")), Err(GuardError::ClientInput(_))));

        let long = "x".repeat(MAX_TOKEN_LENGTH + 1);
        assert!(matches!(
            validate_token(Some(&long)),
            Err(GuardError::ClientInput(m)) if m == TOKEN_MALFORMED
        ));

        assert_eq!(validate_token(Some(" abc ")).unwrap(), " abc ");

        let wide = "é".repeat(MAX_TOKEN_LENGTH);
        assert_eq!(validate_token(Some(&wide)).unwrap(), wide);
    }
}
