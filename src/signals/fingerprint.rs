use std::env;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::{GuardError, Result};

/// 指纹派生使用的 UUID v5 命名空间
const FINGERPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_3a52_9d0e_4b7a_8f21_c4d5_e6f7_0819);

/// 设备指纹来源
///
/// 指纹是不透明的稳定标识，只要求同一设备多次获取结果相同。
#[async_trait]
pub trait FingerprintSource: Send + Sync {
    async fn fingerprint(&self) -> Result<String>;
}

/// 基于机器标识的指纹
///
/// 依次读取 machine-id 文件；都不可用时退回到 hostname + 用户名。
pub struct MachineFingerprint {
    machine_id_paths: Vec<PathBuf>,
}

impl MachineFingerprint {
    pub fn new() -> Self {
        Self {
            machine_id_paths: vec![
                PathBuf::from("/etc/machine-id"),
                PathBuf::from("/var/lib/dbus/machine-id"),
            ],
        }
    }

    pub fn with_paths(machine_id_paths: Vec<PathBuf>) -> Self {
        Self { machine_id_paths }
    }

    /// 由原始标识派生指纹（32 位十六进制）
    pub fn derive(material: &str) -> String {
        Uuid::new_v5(&FINGERPRINT_NAMESPACE, material.as_bytes())
            .simple()
            .to_string()
    }

    async fn read_machine_id(&self) -> Option<String> {
        for path in &self.machine_id_paths {
            match tokio::fs::read_to_string(path).await {
                Ok(content) if !content.trim().is_empty() => {
                    debug!("🔑 使用 machine-id: {}", path.display());
                    return Some(content.trim().to_string());
                }
                _ => continue,
            }
        }
        None
    }

    async fn host_identity() -> Option<String> {
        let hostname = match env::var("HOSTNAME") {
            Ok(h) if !h.trim().is_empty() => Some(h),
            _ => tokio::fs::read_to_string("/etc/hostname")
                .await
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
        }?;
        let user = env::var("USER")
            .or_else(|_| env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Some(format!("{}-{}", hostname, user))
    }
}

impl Default for MachineFingerprint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FingerprintSource for MachineFingerprint {
    async fn fingerprint(&self) -> Result<String> {
        if let Some(machine_id) = self.read_machine_id().await {
            return Ok(Self::derive(&machine_id));
        }
        match Self::host_identity().await {
            Some(identity) => Ok(Self::derive(&identity)),
            None => Err(GuardError::Internal(
                "no stable machine identity available".to_string(),
            )),
        }
    }
}

/// 调用方已持有指纹时使用
pub struct StaticFingerprint(String);

impl StaticFingerprint {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self(fingerprint.into())
    }
}

#[async_trait]
impl FingerprintSource for StaticFingerprint {
    async fn fingerprint(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(GuardError::Internal("empty device fingerprint".to_string()));
        }
        Ok(self.0.clone())
    }
}
