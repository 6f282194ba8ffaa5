//! Prometheus 指标：验证码校验结果、安全检查结果、上游延迟
//!
//! 通过 `init()` 安装全局 Recorder，通过 HTTP GET `/metrics` 暴露抓取端点。
//! 未初始化时所有 `record_*` 调用都是空操作。

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 指标名称
const COUNTER_CAPTCHA_VERIFY_TOTAL: &str = "chatguard_captcha_verify_total";
const COUNTER_GATE_CHECK_TOTAL: &str = "chatguard_gate_check_total";
const HISTOGRAM_UPSTREAM_DURATION: &str = "chatguard_upstream_duration_seconds";

/// 初始化 Prometheus 指标（安装全局 Recorder）。
/// 仅需在进程内调用一次；重复调用会返回 Err。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    HANDLE
        .set(handle)
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

pub fn is_initialized() -> bool {
    HANDLE.get().is_some()
}

/// 渲染当前指标为 Prometheus 文本格式，供 GET /metrics 使用。
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// 记录一次验证码校验结果（success / client_input / configuration / upstream_rejected ...）
pub fn record_captcha_verification(outcome: &'static str) {
    metrics::counter!(COUNTER_CAPTCHA_VERIFY_TOTAL, "outcome" => outcome).increment(1);
}

/// 记录一次安全检查结果（allowed / denied / unavailable / invalid_input）
pub fn record_gate_check(outcome: &'static str) {
    metrics::counter!(COUNTER_GATE_CHECK_TOTAL, "outcome" => outcome).increment(1);
}

/// 记录一次上游调用耗时
pub fn record_upstream_latency(upstream: &'static str, duration_secs: f64) {
    metrics::histogram!(HISTOGRAM_UPSTREAM_DURATION, "upstream" => upstream).record(duration_secs);
}
