use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{GuardError, Result};

/// 决策服务不可达或响应无法解析时的固定原因
pub const UNAVAILABLE_REASON: &str = "Unable to verify security. Please try again.";

/// 决策服务拒绝但未给出原因时的默认值
pub const DEFAULT_DENIAL_REASON: &str = "Security check failed";

/// 邮箱为空
pub const EMAIL_REQUIRED_REASON: &str = "Email is required";

/// 安全检查请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityCheckRequest {
    pub email: String,
    pub device_fingerprint: String,
    pub is_register: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suspicious_extensions: Vec<String>,
}

/// 拒绝类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityCheckType {
    Vpn,
    Device,
    IpChange,
    Extension,
    Blocked,
}

impl SecurityCheckType {
    /// 宽松解析：未知类别一律按 blocked 处理
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "vpn" => SecurityCheckType::Vpn,
            "device" => SecurityCheckType::Device,
            "ip_change" => SecurityCheckType::IpChange,
            "extension" => SecurityCheckType::Extension,
            _ => SecurityCheckType::Blocked,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityCheckType::Vpn => "vpn",
            SecurityCheckType::Device => "device",
            SecurityCheckType::IpChange => "ip_change",
            SecurityCheckType::Extension => "extension",
            SecurityCheckType::Blocked => "blocked",
        }
    }
}

/// 安全检查结果
///
/// 序列化时输出决策服务的原始响应体。放行结果原样保留；
/// 拒绝结果的 `reason` / `type` 会被补齐为规范值。
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityCheckResult {
    allowed: bool,
    reason: Option<String>,
    check_type: Option<SecurityCheckType>,
    body: Map<String, Value>,
}

impl SecurityCheckResult {
    pub fn allow() -> Self {
        let mut body = Map::new();
        body.insert("allowed".to_string(), Value::Bool(true));
        Self {
            allowed: true,
            reason: None,
            check_type: None,
            body,
        }
    }

    pub fn deny(reason: impl Into<String>, check_type: SecurityCheckType) -> Self {
        Self::denial_with_body(Map::new(), reason.into(), check_type)
    }

    /// 失败关闭：无法得到明确结论时的拒绝
    pub fn unavailable() -> Self {
        Self::deny(UNAVAILABLE_REASON, SecurityCheckType::Blocked)
    }

    /// 由决策服务 2xx 响应体构造
    ///
    /// 缺少布尔型 `allowed` 的响应体视为无法解析。
    pub fn from_decision_body(body: Map<String, Value>) -> Result<Self> {
        let allowed = body
            .get("allowed")
            .and_then(Value::as_bool)
            .ok_or_else(|| GuardError::Transport("decision body has no boolean `allowed`".to_string()))?;

        let reason = body
            .get("reason")
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string);
        let check_type = body
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(SecurityCheckType::parse_lenient);

        if allowed {
            return Ok(Self {
                allowed,
                reason,
                check_type,
                body,
            });
        }

        Ok(Self::denial_with_body(
            body,
            reason.unwrap_or_else(|| DEFAULT_DENIAL_REASON.to_string()),
            check_type.unwrap_or(SecurityCheckType::Blocked),
        ))
    }

    fn denial_with_body(
        mut body: Map<String, Value>,
        reason: String,
        check_type: SecurityCheckType,
    ) -> Self {
        body.insert("allowed".to_string(), Value::Bool(false));
        body.insert("reason".to_string(), Value::String(reason.clone()));
        body.insert(
            "type".to_string(),
            Value::String(check_type.as_str().to_string()),
        );
        Self {
            allowed: false,
            reason: Some(reason),
            check_type: Some(check_type),
            body,
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn check_type(&self) -> Option<SecurityCheckType> {
        self.check_type
    }

    /// 完整响应体（含决策服务的附加字段）
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }
}

impl Serialize for SecurityCheckResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecurityCheckResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let body = Map::<String, Value>::deserialize(deserializer)?;
        Self::from_decision_body(body).map_err(serde::de::Error::custom)
    }
}

/// 决策服务非 2xx 时的响应体
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DecisionErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub check_type: Option<String>,
}

impl From<DecisionErrorBody> for SecurityCheckResult {
    fn from(body: DecisionErrorBody) -> Self {
        let reason = body
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_DENIAL_REASON.to_string());
        let check_type = body
            .check_type
            .filter(|t| !t.is_empty())
            .map(|t| SecurityCheckType::parse_lenient(&t))
            .unwrap_or(SecurityCheckType::Blocked);
        SecurityCheckResult::deny(reason, check_type)
    }
}
