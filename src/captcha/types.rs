use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Turnstile token 最大长度
pub const MAX_TOKEN_LENGTH: usize = 2048;

pub const TOKEN_REQUIRED: &str = "Captcha token is required";
pub const TOKEN_MALFORMED: &str = "Captcha token is malformed";

/// 客户端请求
///
/// `token` 缺失和为空按同一种输入错误处理，因此声明为 Option。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptchaVerifyRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// 发给 Turnstile 的表单
#[derive(Debug, Clone, Serialize)]
pub struct SiteverifyRequest {
    pub secret: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remoteip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Turnstile 响应
///
/// 只有 `success` 是严格字段。其余字段格式漂移时按缺失处理，
/// 保证服务方的拒绝结论总能带着错误码返回给调用方。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnstileVerifyResponse {
    pub success: bool,
    /// 原样转发，不做格式校验
    #[serde(default, deserialize_with = "lenient_string")]
    pub challenge_ts: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hostname: Option<String>,
    #[serde(rename = "error-codes", default, deserialize_with = "lenient_codes")]
    pub error_codes: Vec<String>,
}

impl TurnstileVerifyResponse {
    /// 解析 challenge 时间（无法解析时为 None）
    pub fn challenge_time(&self) -> Option<DateTime<Utc>> {
        self.challenge_ts
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_codes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(code) => Some(code),
                _ => None,
            })
            .collect(),
        Some(Value::String(code)) => vec![code],
        _ => Vec::new(),
    })
}

/// 校验通过时返回给调用方的结果（只包含白名单字段）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaVerifyResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl From<TurnstileVerifyResponse> for CaptchaVerifyResult {
    fn from(response: TurnstileVerifyResponse) -> Self {
        Self {
            success: response.success,
            challenge_ts: response.challenge_ts,
            hostname: response.hostname,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_provider_payload() {
        let response: TurnstileVerifyResponse = serde_json::from_value(json!({
            "success": false,
            "error-codes": ["invalid-input-response"],
            "messages": []
        }))
        .unwrap();
        assert!(!response.success);
        assert_eq!(response.error_codes, vec!["invalid-input-response"]);
    }

    #[test]
    fn test_result_whitelists_fields() {
        let response: TurnstileVerifyResponse = serde_json::from_value(json!({
            "success": true,
            "challenge_ts": "2022-02-28T15:14:30.096Z",
            "hostname": "chat.example.com",
            "action": "login",
            "cdata": "sessionid-123",
            "score": 0.9
        }))
        .unwrap();
        let body = serde_json::to_value(CaptchaVerifyResult::from(response)).unwrap();
        let keys: Vec<_> = body.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(body["hostname"], "chat.example.com");
        assert!(body.get("cdata").is_none());
    }

    #[test]
    fn test_form_omits_missing_remoteip() {
        let form = SiteverifyRequest {
            secret: "s".to_string(),
            response: "t".to_string(),
            remoteip: None,
            idempotency_key: None,
        };
        let value = serde_json::to_value(&form).unwrap();
        assert!(value.get("remoteip").is_none());
    }

    #[test]
    fn test_rejection_survives_field_drift() {
        let response: TurnstileVerifyResponse = serde_json::from_value(json!({
            "success": false,
            "error-codes": ["timeout-or-duplicate", 42],
            "challenge_ts": "",
            "hostname": null,
            "score": "high"
        }))
        .unwrap();
        assert!(!response.success);
        assert_eq!(response.error_codes, vec!["timeout-or-duplicate"]);
        assert_eq!(response.challenge_ts.as_deref(), Some(""));
        assert!(response.challenge_time().is_none());

        let response: TurnstileVerifyResponse =
            serde_json::from_value(json!({"success": false, "error-codes": null})).unwrap();
        assert!(response.error_codes.is_empty());
    }

    #[test]
    fn test_challenge_ts_is_relayed_verbatim() {
        let response: TurnstileVerifyResponse = serde_json::from_value(json!({
            "success": true,
            "challenge_ts": "2022-02-28T15:14:30.096Z"
        }))
        .unwrap();
        assert!(response.challenge_time().is_some());
        let body = serde_json::to_value(CaptchaVerifyResult::from(response)).unwrap();
        assert_eq!(body["challenge_ts"], "2022-02-28T15:14:30.096Z");
    }
}
