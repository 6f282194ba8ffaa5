//! 设备信号采集
//!
//! - 设备指纹（不透明的稳定标识）
//! - 已安装的 VPN / 代理类浏览器扩展
//!
//! 采集结果只作为参考信号提交给决策服务，本模块不做放行判断。

pub mod collector;
pub mod extensions;
pub mod fingerprint;

pub use collector::{DeviceSignalCollector, DeviceSignals};
pub use extensions::{detect_extensions, ExtensionProbe, KnownExtension, ProfileDirProbe, KNOWN_EXTENSIONS};
pub use fingerprint::{FingerprintSource, MachineFingerprint, StaticFingerprint};
