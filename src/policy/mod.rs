//! 安全策略配置
//!
//! 声明式策略表，由外部决策服务执行，由本服务用于渲染用户可见消息。
//! 进程启动时构造一次，之后通过 `Arc<SecurityPolicy>` 显式传递，运行期只读。
//!
//! 本模块不做任何封禁判定；阈值和触发器的语义由决策服务解释。

pub mod messages;

pub use messages::{MessageCatalog, MessageKey};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::SecurityCheckType;

/// 当前策略版本
pub const POLICY_VERSION: u32 = 1;

/// 策略校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy field `{0}` must be greater than zero")]
    ZeroValue(&'static str),
    #[error("account locking is enabled but no trigger is configured")]
    NoLockTriggers,
    #[error("error message `{0}` is empty")]
    EmptyMessage(&'static str),
    #[error("blocked extension list contains an empty name")]
    EmptyExtensionName,
}

/// VPN 检测
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnDetectionPolicy {
    pub enabled: bool,
    /// 检测到 VPN 时直接拒绝（即使是合法 VPN）
    pub hard_block: bool,
    pub lock_duration_hours: u32,
}

impl Default for VpnDetectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            hard_block: true,
            lock_duration_hours: 24,
        }
    }
}

/// 设备指纹
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceFingerprintPolicy {
    pub enabled: bool,
    pub multi_device_block: bool,
    pub allowed_devices_per_user: u32,
}

impl Default for DeviceFingerprintPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            multi_device_block: true,
            allowed_devices_per_user: 1,
        }
    }
}

/// IP 地理位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpGeolocationPolicy {
    pub enabled: bool,
    pub track_history: bool,
    pub flag_rapid_changes: bool,
    pub rapid_change_threshold_hours: u32,
    pub allow_adjacent_countries: bool,
}

impl Default for IpGeolocationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            track_history: true,
            flag_rapid_changes: true,
            rapid_change_threshold_hours: 24,
            allow_adjacent_countries: true,
        }
    }
}

/// 锁定触发原因（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTrigger {
    VpnDetected,
    SuspiciousLocation,
    NewDevice,
    ThreatDetected,
    RepeatedViolations,
}

impl LockTrigger {
    pub const ALL: [LockTrigger; 5] = [
        LockTrigger::VpnDetected,
        LockTrigger::SuspiciousLocation,
        LockTrigger::NewDevice,
        LockTrigger::ThreatDetected,
        LockTrigger::RepeatedViolations,
    ];
}

/// 账号锁定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountLockingPolicy {
    pub enabled: bool,
    pub lock_duration_hours: u32,
    pub triggers: Vec<LockTrigger>,
}

impl Default for AccountLockingPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_duration_hours: 24,
            triggers: LockTrigger::ALL.to_vec(),
        }
    }
}

/// 永久封禁
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermanentBanPolicy {
    pub enabled: bool,
    /// 累计违规多少次后永久封禁
    pub trigger_after_violations: u32,
    pub block_both_ip_and_device: bool,
}

impl Default for PermanentBanPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_after_violations: 3,
            block_both_ip_and_device: true,
        }
    }
}

/// 默认的可疑扩展名单（显示名）
pub const DEFAULT_BLOCKED_EXTENSIONS: [&str; 10] = [
    "uBlock Origin",
    "Proxy SwitchyOmega",
    "ExpressVPN",
    "NordVPN",
    "Surfshark",
    "CyberGhost",
    "Windscribe",
    "Private Internet Access",
    "IPVanish",
    "TorBrowser",
];

/// 安全策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// 策略版本（决策服务与消息渲染方必须一致）
    pub version: u32,
    pub vpn_detection: VpnDetectionPolicy,
    pub device_fingerprinting: DeviceFingerprintPolicy,
    pub ip_geolocation: IpGeolocationPolicy,
    pub account_locking: AccountLockingPolicy,
    pub permanent_bans: PermanentBanPolicy,
    pub blocked_extensions: Vec<String>,
    pub error_messages: MessageCatalog,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION,
            vpn_detection: VpnDetectionPolicy::default(),
            device_fingerprinting: DeviceFingerprintPolicy::default(),
            ip_geolocation: IpGeolocationPolicy::default(),
            account_locking: AccountLockingPolicy::default(),
            permanent_bans: PermanentBanPolicy::default(),
            blocked_extensions: DEFAULT_BLOCKED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            error_messages: MessageCatalog::default(),
        }
    }
}

impl SecurityPolicy {
    /// 校验策略表
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.version == 0 {
            return Err(PolicyError::ZeroValue("version"));
        }
        if self.vpn_detection.lock_duration_hours == 0 {
            return Err(PolicyError::ZeroValue("vpn_detection.lock_duration_hours"));
        }
        if self.device_fingerprinting.allowed_devices_per_user == 0 {
            return Err(PolicyError::ZeroValue(
                "device_fingerprinting.allowed_devices_per_user",
            ));
        }
        if self.ip_geolocation.rapid_change_threshold_hours == 0 {
            return Err(PolicyError::ZeroValue(
                "ip_geolocation.rapid_change_threshold_hours",
            ));
        }
        if self.account_locking.lock_duration_hours == 0 {
            return Err(PolicyError::ZeroValue("account_locking.lock_duration_hours"));
        }
        if self.account_locking.enabled && self.account_locking.triggers.is_empty() {
            return Err(PolicyError::NoLockTriggers);
        }
        if self.permanent_bans.trigger_after_violations == 0 {
            return Err(PolicyError::ZeroValue(
                "permanent_bans.trigger_after_violations",
            ));
        }
        if self.blocked_extensions.iter().any(|n| n.trim().is_empty()) {
            return Err(PolicyError::EmptyExtensionName);
        }
        if let Some(key) = self.error_messages.first_empty() {
            return Err(PolicyError::EmptyMessage(key.as_str()));
        }
        Ok(())
    }

    /// 网关结果类别对应的用户可见消息
    pub fn message_for(&self, check_type: SecurityCheckType) -> &str {
        let key = match check_type {
            SecurityCheckType::Vpn => MessageKey::Vpn,
            SecurityCheckType::Device => MessageKey::DeviceBlocked,
            SecurityCheckType::IpChange => MessageKey::LocationChange,
            SecurityCheckType::Extension => MessageKey::Vpn,
            SecurityCheckType::Blocked => MessageKey::AccountLocked,
        };
        self.error_messages.get(key)
    }

    pub fn is_blocked_extension(&self, name: &str) -> bool {
        self.blocked_extensions.iter().any(|n| n == name)
    }

    pub fn locks_on(&self, trigger: LockTrigger) -> bool {
        self.account_locking.enabled && self.account_locking.triggers.contains(&trigger)
    }
}
