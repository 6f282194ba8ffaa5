use std::env;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

/// 已知的 VPN / 代理类浏览器扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownExtension {
    /// 显示名（与策略中的 blocked_extensions 对应）
    pub name: &'static str,
    /// Chrome 应用商店 ID
    pub id: &'static str,
}

impl KnownExtension {
    /// 扩展唯一资源地址
    pub fn manifest_url(&self) -> String {
        format!("chrome-extension://{}/manifest.json", self.id)
    }
}

pub const KNOWN_EXTENSIONS: [KnownExtension; 7] = [
    KnownExtension { name: "uBlock Origin", id: "cjpalhdlnbpafiamejdnhcpgccdnjbgj" },
    KnownExtension { name: "Proxy SwitchyOmega", id: "padekgcemlokbadohgkichalifbchfid" },
    KnownExtension { name: "ExpressVPN", id: "fgddmllnllkalaagkghckoinaemmogpe" },
    KnownExtension { name: "NordVPN", id: "fjoalegetlsflcbfnmjkbjkngmdhljgg" },
    KnownExtension { name: "Surfshark", id: "klbibkeccnyohtwfmfcebalnhnhiiina" },
    KnownExtension { name: "CyberGhost", id: "lnfpkdhkpknfdljfdnccagfifnilbbkb" },
    KnownExtension { name: "Windscribe", id: "kfffakakmofflkpejakeikficjfjlmck" },
];

/// 扩展探测
///
/// 探测失败一律视为"未安装"，因此只返回 bool。
#[async_trait]
pub trait ExtensionProbe: Send + Sync {
    async fn is_installed(&self, extension: &KnownExtension) -> bool;
}

/// 检查浏览器 profile 目录下的 `Extensions/<id>/`
pub struct ProfileDirProbe {
    profile_dirs: Vec<PathBuf>,
}

impl ProfileDirProbe {
    pub fn new(profile_dirs: Vec<PathBuf>) -> Self {
        Self { profile_dirs }
    }

    /// Chromium 系浏览器在各平台的默认 profile
    pub fn default_profiles() -> Self {
        let mut dirs = Vec::new();

        if let Ok(home) = env::var("HOME") {
            let home = PathBuf::from(home);
            for relative in [
                ".config/google-chrome/Default",
                ".config/chromium/Default",
                ".config/BraveSoftware/Brave-Browser/Default",
                ".config/microsoft-edge/Default",
                "Library/Application Support/Google/Chrome/Default",
                "Library/Application Support/BraveSoftware/Brave-Browser/Default",
            ] {
                dirs.push(home.join(relative));
            }
        }

        if let Ok(local) = env::var("LOCALAPPDATA") {
            let local = PathBuf::from(local);
            dirs.push(local.join("Google/Chrome/User Data/Default"));
            dirs.push(local.join("Microsoft/Edge/User Data/Default"));
        }

        Self::new(dirs)
    }

    pub fn profile_dirs(&self) -> &[PathBuf] {
        &self.profile_dirs
    }
}

#[async_trait]
impl ExtensionProbe for ProfileDirProbe {
    async fn is_installed(&self, extension: &KnownExtension) -> bool {
        for dir in &self.profile_dirs {
            let path = dir.join("Extensions").join(extension.id);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!("🧩 检测到扩展 {} ({})", extension.name, path.display());
                return true;
            }
        }
        false
    }
}

/// 并发探测所有扩展，全部结束后返回已安装的扩展名（保持表顺序）
///
/// 每个探测单独计时，超时视为未安装。
pub async fn detect_extensions(
    probe: &dyn ExtensionProbe,
    extensions: &[KnownExtension],
    per_probe_timeout: Duration,
) -> Vec<String> {
    let probes = extensions.iter().map(|extension| async move {
        match tokio::time::timeout(per_probe_timeout, probe.is_installed(extension)).await {
            Ok(true) => Some(extension.name.to_string()),
            Ok(false) => None,
            Err(_) => {
                debug!("⏱️ 扩展探测超时: {}", extension.name);
                None
            }
        }
    });

    join_all(probes).await.into_iter().flatten().collect()
}
