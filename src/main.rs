use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatguard::{
    captcha::{CaptchaVerifyService, TurnstileProvider},
    cli::{Cli, Commands},
    config::{self, ServerConfig},
    gate::{SecurityCheckResult, SecurityGateClient},
    http::{HttpServer, HttpServerState},
    infra::metrics,
    logging,
    signals::{DeviceSignalCollector, MachineFingerprint, ProfileDirProbe},
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::GenerateConfig { path }) => {
            generate_config(path)?;
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::ValidateConfig { path }) => {
            validate_config(path)?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    // 快速读取 config.toml 的 [logging] 段（不加载完整配置）
    let early_log = config::load_early_logging_config(cli.config_file.as_deref());

    // 合并日志配置（优先级：CLI > config.toml > 默认值）
    let log_level = cli
        .get_log_level()
        .or(early_log.level)
        .unwrap_or_else(|| "info".to_string());
    let log_format = cli.get_log_format().or(early_log.format);
    let log_file = cli.log_file.clone().or(early_log.file);

    let _log_guard = logging::init_logging(
        &log_level,
        log_format.as_deref(),
        log_file.as_deref(),
        cli.quiet,
        cli.logs_to_stderr(),
    )?;

    // 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    let config = ServerConfig::load(&cli).context("加载配置失败")?;
    config.validate().context("配置校验失败")?;

    // 通过返回值退出，保证日志 guard 在进程结束前被 drop
    match &cli.command {
        Some(Commands::ShowConfig) => {
            show_config(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Check { email, register }) => run_check(&config, email, *register).await,
        _ => run_server(config).await,
    }
}

async fn run_server(config: ServerConfig) -> Result<ExitCode> {
    tracing::info!("🚀 chatguard starting...");
    tracing::info!("📊 Server Configuration:");
    tracing::info!("  - Bind: {}", config.bind_address());
    tracing::info!("  - Turnstile: {}", config.captcha.verify_url);
    tracing::info!("  - Captcha Secret Configured: {}", config.captcha.is_configured());
    tracing::info!("  - Policy Version: {}", config.policy.version);
    tracing::info!("  - Metrics: {}", config.enable_metrics);

    if !config.captcha.is_configured() {
        tracing::error!(
            "❌ {} 未配置，所有验证码校验请求都会返回 500",
            config::TURNSTILE_SECRET_ENV
        );
    }

    if config.enable_metrics && !metrics::is_initialized() {
        if let Err(e) = metrics::init() {
            tracing::warn!("⚠️ Prometheus 指标初始化失败: {}", e);
        }
    }

    let provider = TurnstileProvider::new(
        config.captcha.verify_url.clone(),
        config.captcha.request_timeout(),
    )?;
    let captcha = CaptchaVerifyService::new(Arc::new(provider), config.captcha.secret_key.clone())
        .with_forward_remote_ip(config.captcha.forward_remote_ip);

    let state = HttpServerState {
        captcha: Arc::new(captcha),
        policy: Arc::new(config.policy.clone()),
    };

    let server = HttpServer::new(state, config.bind_address());
    if let Err(e) = server.start().await {
        tracing::error!("❌ 服务器运行失败: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

/// 在本机采集设备信号并调用决策服务
async fn run_check(config: &ServerConfig, email: &str, register: bool) -> Result<ExitCode> {
    let policy = Arc::new(config.policy.clone());

    let probe = if config.signals.profile_dirs.is_empty() {
        ProfileDirProbe::default_profiles()
    } else {
        ProfileDirProbe::new(config.signals.profile_dirs.clone())
    };

    let collector = DeviceSignalCollector::new(
        Arc::new(MachineFingerprint::new()),
        Arc::new(probe),
        policy.clone(),
    )
    .with_probe_timeout(config.signals.probe_timeout());

    let client = SecurityGateClient::new(&config.gate, Arc::new(collector))?;
    tracing::info!("🔍 安全检查: {} -> {}", email, client.decision_url());

    let result = client.check_security_before_auth(email, register).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.allowed() {
        if let Some(check_type) = result.check_type() {
            eprintln!("{}", policy.message_for(check_type));
        }
    }
    Ok(ExitCode::from(check_exit_status(&result)))
}

/// `check` 的退出码：放行 0，拒绝 2
fn check_exit_status(result: &SecurityCheckResult) -> u8 {
    if result.allowed() {
        0
    } else {
        2
    }
}

/// 生成默认配置文件
fn generate_config(path: &str) -> Result<()> {
    let default_config = r#"# chatguard 配置文件
# 此文件由 chatguard generate-config 生成
# Turnstile 密钥请通过环境变量 CLOUDFLARE_TURNSTILE_SECRET_KEY 提供

[server]
host = "0.0.0.0"
port = 8787
enable_metrics = false

[captcha]
verify_url = "https://challenges.cloudflare.com/turnstile/v0/siteverify"
request_timeout_secs = 10
forward_remote_ip = true

[gate]
decision_url = "http://127.0.0.1:3000/api/security/check"
request_timeout_secs = 10
fingerprint_timeout_secs = 5
report_extensions = true

[signals]
probe_timeout_ms = 500
# profile_dirs = ["/home/me/.config/google-chrome/Default"]

[logging]
level = "info"
format = "compact"
# file = "./logs/chatguard.log"

[policy]
version = 1

[policy.permanent_bans]
trigger_after_violations = 3
"#;

    fs::write(path, default_config).with_context(|| format!("无法写入配置文件: {}", path))?;

    println!("✅ 配置文件已生成: {}", path);
    Ok(())
}

/// 验证配置文件
fn validate_config(path: &str) -> Result<()> {
    let config = ServerConfig::from_toml_file(path)
        .with_context(|| format!("配置文件验证失败: {}", path))?;
    config
        .validate()
        .with_context(|| format!("配置文件验证失败: {}", path))?;

    println!("✅ 配置文件有效: {}", path);
    println!("📊 配置摘要:");
    println!("  - Bind: {}", config.bind_address());
    println!("  - Decision URL: {}", config.gate.decision_url);
    println!("  - Policy Version: {}", config.policy.version);

    Ok(())
}

/// 显示最终配置（合并后的配置，不含密钥）
fn show_config(config: &ServerConfig) -> Result<()> {
    eprintln!("📊 最终配置（合并后的配置）:");
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatguard::gate::SecurityCheckType;

    #[test]
    fn test_check_exit_status() {
        assert_eq!(check_exit_status(&SecurityCheckResult::allow()), 0);
        assert_eq!(check_exit_status(&SecurityCheckResult::unavailable()), 2);
        assert_eq!(
            check_exit_status(&SecurityCheckResult::deny("VPN detected", SecurityCheckType::Vpn)),
            2
        );
    }
}
