use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 安全网关错误类型
///
/// `Display` 只用于日志；返回给调用方的永远是 [`GuardError::public_message`]。
#[derive(Debug, Clone, Error)]
pub enum GuardError {
    /// 客户端输入错误（缺少 token / email 等）
    #[error("Client input error: {0}")]
    ClientInput(String),
    /// 配置错误（缺少密钥等）
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// 上游不可用（网络错误或非 2xx）
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// 上游明确拒绝
    #[error("Upstream rejected: {error_codes:?}")]
    UpstreamRejected { error_codes: Vec<String> },
    /// 本地传输或解析异常
    #[error("Transport error: {0}")]
    Transport(String),
    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
    /// HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            GuardError::ClientInput(_) => StatusCode::BAD_REQUEST,
            GuardError::UpstreamRejected { .. } => StatusCode::FORBIDDEN,
            GuardError::Configuration(_)
            | GuardError::UpstreamUnavailable(_)
            | GuardError::Transport(_)
            | GuardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 对外公开的错误消息（不包含内部细节）
    pub fn public_message(&self) -> String {
        match self {
            // 输入错误的消息由调用方构造，本身不含内部信息
            GuardError::ClientInput(msg) => msg.clone(),
            GuardError::Configuration(_) => "Captcha verification service misconfigured".to_string(),
            GuardError::UpstreamUnavailable(_) => "Failed to verify captcha".to_string(),
            GuardError::UpstreamRejected { .. } => "Captcha verification failed".to_string(),
            GuardError::Transport(_) | GuardError::Internal(_) => {
                "Captcha verification failed".to_string()
            }
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        (status_code, Json(ErrorResponse::new(&self))).into_response()
    }
}

impl From<reqwest::Error> for GuardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GuardError::Transport(err.to_string())
        } else {
            GuardError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        GuardError::Transport(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for GuardError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        GuardError::UpstreamUnavailable(format!("timed out: {}", err))
    }
}

impl From<std::io::Error> for GuardError {
    fn from(err: std::io::Error) -> Self {
        GuardError::Internal(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, GuardError>;

/// 错误代码（用于日志和指标标签）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ClientInput,
    Configuration,
    UpstreamUnavailable,
    UpstreamRejected,
    Transport,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ClientInput => "client_input",
            ErrorCode::Configuration => "configuration",
            ErrorCode::UpstreamUnavailable => "upstream_unavailable",
            ErrorCode::UpstreamRejected => "upstream_rejected",
            ErrorCode::Transport => "transport",
            ErrorCode::Internal => "internal",
        }
    }
}

impl From<&GuardError> for ErrorCode {
    fn from(error: &GuardError) -> Self {
        match error {
            GuardError::ClientInput(_) => ErrorCode::ClientInput,
            GuardError::Configuration(_) => ErrorCode::Configuration,
            GuardError::UpstreamUnavailable(_) => ErrorCode::UpstreamUnavailable,
            GuardError::UpstreamRejected { .. } => ErrorCode::UpstreamRejected,
            GuardError::Transport(_) => ErrorCode::Transport,
            GuardError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// 错误响应
///
/// 与验证码接口的失败响应同形：`{success:false, error, error_codes?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_codes: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: &GuardError) -> Self {
        let error_codes = match error {
            GuardError::UpstreamRejected { error_codes } => Some(error_codes.clone()),
            _ => None,
        };
        Self {
            success: false,
            error: error.public_message(),
            error_codes,
        }
    }
}
