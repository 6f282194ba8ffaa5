use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::policy::SecurityPolicy;

/// Turnstile 官方校验地址
pub const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Turnstile 密钥环境变量
pub const TURNSTILE_SECRET_ENV: &str = "CLOUDFLARE_TURNSTILE_SECRET_KEY";

/// 敏感字符串（Debug 输出时脱敏，序列化时跳过）
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// 空字符串视为未配置
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// 服务器监听地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// 日志级别
    pub log_level: String,
    /// 是否启用 Prometheus 指标
    pub enable_metrics: bool,
    /// 验证码代理配置
    pub captcha: CaptchaConfig,
    /// 安全网关客户端配置
    pub gate: GateConfig,
    /// 设备信号采集配置
    pub signals: SignalsConfig,
    /// 安全策略（只读）
    pub policy: SecurityPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            log_level: "info".to_string(),
            enable_metrics: false,
            captcha: CaptchaConfig::default(),
            gate: GateConfig::default(),
            signals: SignalsConfig::default(),
            policy: SecurityPolicy::default(),
        }
    }
}

/// 验证码代理配置
#[derive(Debug, Clone, Serialize)]
pub struct CaptchaConfig {
    /// Turnstile 密钥（只从环境变量或配置文件读取一次，永不输出）
    #[serde(skip_serializing)]
    pub secret_key: Option<SecretString>,
    /// Turnstile 校验地址
    pub verify_url: String,
    /// 上游请求超时（秒）
    pub request_timeout_secs: u64,
    /// 是否把调用方 IP 转发给 Turnstile
    pub forward_remote_ip: bool,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            verify_url: TURNSTILE_VERIFY_URL.to_string(),
            request_timeout_secs: 10,
            forward_remote_ip: true,
        }
    }
}

impl CaptchaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }
}

/// 安全网关客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// 决策服务地址（POST）
    pub decision_url: String,
    /// 决策请求超时（秒）
    pub request_timeout_secs: u64,
    /// 设备信号采集超时（秒）
    pub fingerprint_timeout_secs: u64,
    /// 是否把检测到的可疑扩展一并上报
    pub report_extensions: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            decision_url: "http://127.0.0.1:3000/api/security/check".to_string(),
            request_timeout_secs: 10,
            fingerprint_timeout_secs: 5,
            report_extensions: true,
        }
    }
}

impl GateConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fingerprint_timeout(&self) -> Duration {
        Duration::from_secs(self.fingerprint_timeout_secs)
    }
}

/// 设备信号采集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    /// 单个扩展探测超时（毫秒）
    pub probe_timeout_ms: u64,
    /// 浏览器 profile 目录（为空时使用各平台默认目录）
    pub profile_dirs: Vec<PathBuf>,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 500,
            profile_dirs: Vec::new(),
        }
    }
}

impl SignalsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl ServerConfig {
    /// 创建新的服务器配置
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("无法读取配置文件: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("配置文件格式错误")?;
        Ok(toml_config.into())
    }

    /// 从环境变量合并配置（CHATGUARD_ 前缀）
    pub fn merge_from_env(&mut self) {
        self.merge_from_vars(|key| env::var(key).ok());
    }

    /// 按给定的查找函数合并环境变量
    pub fn merge_from_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CHATGUARD_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("CHATGUARD_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!("⚠️ 无效的 CHATGUARD_PORT: {}，保持 {}", port, self.port),
            }
        }
        if let Some(log_level) = lookup("CHATGUARD_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(url) = lookup("CHATGUARD_DECISION_URL") {
            self.gate.decision_url = url;
        }
        if let Some(url) = lookup("CHATGUARD_TURNSTILE_VERIFY_URL") {
            self.captcha.verify_url = url;
        }

        // 密钥
        if let Some(secret) = lookup(TURNSTILE_SECRET_ENV) {
            if let Some(secret) = SecretString::new(secret) {
                self.captcha.secret_key = Some(secret);
            }
        }
    }

    /// 从命令行参数合并配置
    pub fn merge_from_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(url) = &cli.decision_url {
            self.gate.decision_url = url.clone();
        }
        if cli.enable_metrics {
            self.enable_metrics = true;
        }
        if let Some(log_level) = cli.get_log_level() {
            self.log_level = log_level;
        }
    }

    /// 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    pub fn load(cli: &crate::cli::Cli) -> Result<Self> {
        // 1. 配置文件（如果存在）
        let mut config = if let Some(config_file) = &cli.config_file {
            if Path::new(config_file).exists() {
                info!("📄 从配置文件加载: {}", config_file);
                Self::from_toml_file(config_file)?
            } else {
                warn!("⚠️ 配置文件不存在: {}", config_file);
                Self::new()
            }
        } else if Path::new("config.toml").exists() {
            info!("📄 从默认配置文件加载: config.toml");
            Self::from_toml_file("config.toml")?
        } else {
            Self::new()
        };

        // 2. 环境变量
        config.merge_from_env();

        // 3. 命令行参数
        config.merge_from_cli(cli);

        Ok(config)
    }

    /// 校验配置
    ///
    /// 缺少 Turnstile 密钥不算错误：服务照常启动，每个验证请求返回 500。
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.captcha.verify_url)
            .with_context(|| format!("无效的 captcha.verify_url: {}", self.captcha.verify_url))?;
        Url::parse(&self.gate.decision_url)
            .with_context(|| format!("无效的 gate.decision_url: {}", self.gate.decision_url))?;

        if self.captcha.request_timeout_secs == 0 {
            bail!("captcha.request_timeout_secs 必须大于 0");
        }
        if self.gate.request_timeout_secs == 0 || self.gate.fingerprint_timeout_secs == 0 {
            bail!("gate 超时必须大于 0");
        }
        if self.signals.probe_timeout_ms == 0 {
            bail!("signals.probe_timeout_ms 必须大于 0");
        }

        self.policy.validate().context("安全策略无效")?;
        Ok(())
    }
}

/// TOML 配置文件结构（用于反序列化）
#[derive(Debug, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    captcha: Option<TomlCaptchaConfig>,
    gate: Option<TomlGateConfig>,
    signals: Option<TomlSignalsConfig>,
    #[allow(dead_code)]
    logging: Option<TomlLoggingConfig>,
    policy: Option<SecurityPolicy>,
}

#[derive(Debug, Deserialize)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
    enable_metrics: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TomlCaptchaConfig {
    secret_key: Option<String>,
    verify_url: Option<String>,
    request_timeout_secs: Option<u64>,
    forward_remote_ip: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TomlGateConfig {
    decision_url: Option<String>,
    request_timeout_secs: Option<u64>,
    fingerprint_timeout_secs: Option<u64>,
    report_extensions: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TomlSignalsConfig {
    probe_timeout_ms: Option<u64>,
    profile_dirs: Option<Vec<PathBuf>>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlLoggingConfig {
    level: Option<String>,
    format: Option<String>,
    file: Option<String>,
}

impl From<TomlConfig> for ServerConfig {
    fn from(toml: TomlConfig) -> Self {
        let mut config = Self::default();

        if let Some(server) = toml.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(enable) = server.enable_metrics {
                config.enable_metrics = enable;
            }
        }

        if let Some(captcha) = toml.captcha {
            if let Some(secret) = captcha.secret_key {
                config.captcha.secret_key = SecretString::new(secret);
            }
            if let Some(url) = captcha.verify_url {
                config.captcha.verify_url = url;
            }
            if let Some(timeout) = captcha.request_timeout_secs {
                config.captcha.request_timeout_secs = timeout;
            }
            if let Some(forward) = captcha.forward_remote_ip {
                config.captcha.forward_remote_ip = forward;
            }
        }

        if let Some(gate) = toml.gate {
            if let Some(url) = gate.decision_url {
                config.gate.decision_url = url;
            }
            if let Some(timeout) = gate.request_timeout_secs {
                config.gate.request_timeout_secs = timeout;
            }
            if let Some(timeout) = gate.fingerprint_timeout_secs {
                config.gate.fingerprint_timeout_secs = timeout;
            }
            if let Some(report) = gate.report_extensions {
                config.gate.report_extensions = report;
            }
        }

        if let Some(signals) = toml.signals {
            if let Some(timeout) = signals.probe_timeout_ms {
                config.signals.probe_timeout_ms = timeout;
            }
            if let Some(dirs) = signals.profile_dirs {
                config.signals.profile_dirs = dirs;
            }
        }

        if let Some(policy) = toml.policy {
            config.policy = policy;
        }

        config
    }
}

/// 早期日志配置（只读 [logging] 段）
#[derive(Debug, Clone, Default)]
pub struct EarlyLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoggingOnly {
    logging: Option<TomlLoggingConfig>,
}

/// 快速读取配置文件的 [logging] 段，在完整配置加载（以及日志初始化）之前使用。
/// 读取或解析失败时返回空配置。
pub fn load_early_logging_config(config_file: Option<&str>) -> EarlyLoggingConfig {
    let path = config_file.unwrap_or("config.toml");
    let Ok(content) = fs::read_to_string(path) else {
        return EarlyLoggingConfig::default();
    };
    parse_early_logging_config(&content)
}

fn parse_early_logging_config(content: &str) -> EarlyLoggingConfig {
    let logging = toml::from_str::<LoggingOnly>(content)
        .ok()
        .and_then(|c| c.logging)
        .unwrap_or_default();
    EarlyLoggingConfig {
        level: logging.level,
        format: logging.format,
        file: logging.file,
    }
}
