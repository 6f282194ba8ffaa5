use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::policy::SecurityPolicy;

use super::extensions::{detect_extensions, ExtensionProbe, KNOWN_EXTENSIONS};
use super::fingerprint::FingerprintSource;

/// 设备信号
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignals {
    pub fingerprint: String,
    /// 已安装且在策略名单中的扩展
    pub suspicious_extensions: Vec<String>,
}

/// 设备信号采集器
pub struct DeviceSignalCollector {
    fingerprint: Arc<dyn FingerprintSource>,
    probe: Arc<dyn ExtensionProbe>,
    policy: Arc<SecurityPolicy>,
    probe_timeout: Duration,
}

impl DeviceSignalCollector {
    pub fn new(
        fingerprint: Arc<dyn FingerprintSource>,
        probe: Arc<dyn ExtensionProbe>,
        policy: Arc<SecurityPolicy>,
    ) -> Self {
        Self {
            fingerprint,
            probe,
            policy,
            probe_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// 采集指纹与可疑扩展
    ///
    /// 扩展探测全部结束后才返回；指纹获取失败时返回错误。
    pub async fn collect_signals(&self) -> Result<DeviceSignals> {
        let (fingerprint, detected) = tokio::join!(
            self.fingerprint.fingerprint(),
            detect_extensions(self.probe.as_ref(), &KNOWN_EXTENSIONS, self.probe_timeout),
        );
        let fingerprint = fingerprint?;

        let suspicious_extensions: Vec<String> = detected
            .into_iter()
            .filter(|name| self.policy.is_blocked_extension(name))
            .collect();

        debug!(
            "📡 设备信号采集完成: extensions={:?}",
            suspicious_extensions
        );

        Ok(DeviceSignals {
            fingerprint,
            suspicious_extensions,
        })
    }
}
