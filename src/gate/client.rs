use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use url::Url;

use crate::config::GateConfig;
use crate::error::{GuardError, Result};
use crate::infra::metrics;
use crate::signals::DeviceSignalCollector;

use super::types::{
    DecisionErrorBody, SecurityCheckRequest, SecurityCheckResult, SecurityCheckType,
    EMAIL_REQUIRED_REASON,
};

/// 安全网关客户端
///
/// 在登录/注册之前调用决策服务。所有失败都降级为拒绝（失败关闭），不重试、不落盘。
pub struct SecurityGateClient {
    http: Client,
    decision_url: Url,
    collector: Arc<DeviceSignalCollector>,
    fingerprint_timeout: Duration,
    report_extensions: bool,
}

impl SecurityGateClient {
    pub fn new(config: &GateConfig, collector: Arc<DeviceSignalCollector>) -> Result<Self> {
        let decision_url = Url::parse(&config.decision_url).map_err(|e| {
            GuardError::Configuration(format!("invalid decision url {}: {}", config.decision_url, e))
        })?;
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GuardError::Configuration(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            decision_url,
            collector,
            fingerprint_timeout: config.fingerprint_timeout(),
            report_extensions: config.report_extensions,
        })
    }

    pub fn decision_url(&self) -> &Url {
        &self.decision_url
    }

    /// 认证前安全检查（登录流程传 `is_register = false`）
    ///
    /// 永不返回错误：无法得到决策服务的明确结论时返回固定的拒绝结果。
    pub async fn check_security_before_auth(
        &self,
        email: &str,
        is_register: bool,
    ) -> SecurityCheckResult {
        if email.trim().is_empty() {
            warn!("⚠️ 安全检查缺少 email");
            metrics::record_gate_check("invalid_input");
            return SecurityCheckResult::deny(EMAIL_REQUIRED_REASON, SecurityCheckType::Blocked);
        }

        let started = Instant::now();
        let result = self.request_decision(email, is_register).await;
        metrics::record_upstream_latency("decision", started.elapsed().as_secs_f64());

        match result {
            Ok(result) => {
                if result.allowed() {
                    metrics::record_gate_check("allowed");
                } else {
                    info!(
                        "🚫 安全检查拒绝: type={:?}, register={}",
                        result.check_type(), is_register
                    );
                    metrics::record_gate_check("denied");
                }
                result
            }
            Err(e) => {
                error!("❌ 安全检查失败: {}", e);
                metrics::record_gate_check("unavailable");
                SecurityCheckResult::unavailable()
            }
        }
    }

    async fn request_decision(&self, email: &str, is_register: bool) -> Result<SecurityCheckResult> {
        let signals =
            tokio::time::timeout(self.fingerprint_timeout, self.collector.collect_signals()).await??;

        let request = SecurityCheckRequest {
            email: email.to_string(),
            device_fingerprint: signals.fingerprint,
            is_register,
            suspicious_extensions: if self.report_extensions {
                signals.suspicious_extensions
            } else {
                Vec::new()
            },
        };

        let response = self
            .http
            .post(self.decision_url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let rejection: DecisionErrorBody = serde_json::from_slice(&body)?;
            return Ok(SecurityCheckResult::from(rejection));
        }

        let body: Map<String, Value> = serde_json::from_slice(&body)?;
        SecurityCheckResult::from_decision_body(body)
    }
}
