mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chatguard::config::GateConfig;
use chatguard::error::{GuardError, Result};
use chatguard::gate::{
    SecurityCheckType, SecurityGateClient, DEFAULT_DENIAL_REASON, EMAIL_REQUIRED_REASON,
    UNAVAILABLE_REASON,
};
use chatguard::policy::SecurityPolicy;
use chatguard::signals::{
    DeviceSignalCollector, ExtensionProbe, FingerprintSource, KnownExtension, StaticFingerprint,
};
use common::{spawn_server, unused_addr};
use serde_json::{json, Value};

/// 假决策服务：记录收到的请求体，按预设返回
#[derive(Clone)]
struct FakeDecision {
    status: StatusCode,
    body: String,
    delay: Duration,
    received: Arc<Mutex<Vec<Value>>>,
}

impl FakeDecision {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/api/security/check", post(handle_check))
            .with_state(self.clone());
        spawn_server(app).await
    }
}

async fn handle_check(State(fake): State<FakeDecision>, Json(body): Json<Value>) -> Response {
    fake.received.lock().unwrap().push(body);
    if !fake.delay.is_zero() {
        tokio::time::sleep(fake.delay).await;
    }
    (
        fake.status,
        [("content-type", "application/json")],
        fake.body.clone(),
    )
        .into_response()
}

struct NoExtensions;

#[async_trait]
impl ExtensionProbe for NoExtensions {
    async fn is_installed(&self, _extension: &KnownExtension) -> bool {
        false
    }
}

struct InstalledExtensions(&'static [&'static str]);

#[async_trait]
impl ExtensionProbe for InstalledExtensions {
    async fn is_installed(&self, extension: &KnownExtension) -> bool {
        self.0.contains(&extension.name)
    }
}

struct BrokenFingerprint {
    attempts: AtomicUsize,
}

#[async_trait]
impl FingerprintSource for BrokenFingerprint {
    async fn fingerprint(&self) -> Result<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(GuardError::Internal("fingerprint unavailable".to_string()))
    }
}

fn collector(
    fingerprint: Arc<dyn FingerprintSource>,
    probe: Arc<dyn ExtensionProbe>,
) -> Arc<DeviceSignalCollector> {
    Arc::new(DeviceSignalCollector::new(
        fingerprint,
        probe,
        Arc::new(SecurityPolicy::default()),
    ))
}

fn gate_config(addr: SocketAddr) -> GateConfig {
    GateConfig {
        decision_url: format!("http://{}/api/security/check", addr),
        request_timeout_secs: 2,
        ..GateConfig::default()
    }
}

fn client_for(addr: SocketAddr) -> SecurityGateClient {
    SecurityGateClient::new(
        &gate_config(addr),
        collector(
            Arc::new(StaticFingerprint::new("fp-1234")),
            Arc::new(NoExtensions),
        ),
    )
    .unwrap()
}

#[tokio::test]
async fn test_login_allowed() {
    let fake = FakeDecision::new(StatusCode::OK, r#"{"allowed":true}"#);
    let addr = fake.spawn().await;

    let result = client_for(addr)
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(result.allowed());
    assert_eq!(result.reason(), None);
    assert_eq!(result.check_type(), None);
    assert_eq!(
        fake.received(),
        vec![json!({
            "email": "user@example.com",
            "deviceFingerprint": "fp-1234",
            "isRegister": false
        })]
    );
}

#[tokio::test]
async fn test_register_denied_with_vpn() {
    let fake = FakeDecision::new(
        StatusCode::FORBIDDEN,
        r#"{"message":"VPN detected","type":"vpn"}"#,
    );
    let addr = fake.spawn().await;

    let result = client_for(addr)
        .check_security_before_auth("new@example.com", true)
        .await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some("VPN detected"));
    assert_eq!(result.check_type(), Some(SecurityCheckType::Vpn));
    assert_eq!(fake.received()[0]["isRegister"], true);
}

#[tokio::test]
async fn test_success_body_is_passed_through() {
    let body = json!({
        "allowed": true,
        "riskScore": 12,
        "session": {"region": "eu"}
    });
    let fake = FakeDecision::new(StatusCode::OK, body.to_string());
    let addr = fake.spawn().await;

    let result = client_for(addr)
        .check_security_before_auth("user@example.com", false)
        .await;

    assert_eq!(serde_json::to_value(&result).unwrap(), body);
}

#[tokio::test]
async fn test_allowed_body_with_odd_fields_is_not_rewritten() {
    for raw in [
        r#"{"allowed":true,"type":"geo_fence","reason":null}"#,
        r#"{"allowed":true,"reason":7,"type":""}"#,
    ] {
        let fake = FakeDecision::new(StatusCode::OK, raw);
        let addr = fake.spawn().await;

        let result = client_for(addr)
            .check_security_before_auth("user@example.com", false)
            .await;

        assert!(result.allowed(), "body: {}", raw);
        let expected: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), expected);
    }
}

#[tokio::test]
async fn test_denial_in_success_body_gets_reason() {
    let fake = FakeDecision::new(StatusCode::OK, r#"{"allowed":false,"type":"device"}"#);
    let addr = fake.spawn().await;

    let result = client_for(addr)
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some(DEFAULT_DENIAL_REASON));
    assert_eq!(result.check_type(), Some(SecurityCheckType::Device));
}

#[tokio::test]
async fn test_rejection_without_details_uses_defaults() {
    let fake = FakeDecision::new(StatusCode::FORBIDDEN, "{}");
    let addr = fake.spawn().await;

    let result = client_for(addr)
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some(DEFAULT_DENIAL_REASON));
    assert_eq!(result.check_type(), Some(SecurityCheckType::Blocked));
}

#[tokio::test]
async fn test_rejection_with_unparseable_body_fails_closed() {
    let fake = FakeDecision::new(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
    let addr = fake.spawn().await;

    let result = client_for(addr)
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some(UNAVAILABLE_REASON));
    assert_eq!(result.check_type(), Some(SecurityCheckType::Blocked));
}

#[tokio::test]
async fn test_unparseable_success_body_fails_closed() {
    let fake = FakeDecision::new(StatusCode::OK, "allowed");
    let addr = fake.spawn().await;

    let result = client_for(addr)
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some(UNAVAILABLE_REASON));
}

#[tokio::test]
async fn test_unreachable_service_fails_closed() {
    let addr = unused_addr().await;

    let result = client_for(addr)
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some(UNAVAILABLE_REASON));
    assert_eq!(result.check_type(), Some(SecurityCheckType::Blocked));
}

#[tokio::test]
async fn test_slow_service_fails_closed() {
    let fake = FakeDecision::new(StatusCode::OK, r#"{"allowed":true}"#)
        .with_delay(Duration::from_secs(4));
    let addr = fake.spawn().await;

    let config = GateConfig {
        request_timeout_secs: 1,
        ..gate_config(addr)
    };
    let client = SecurityGateClient::new(
        &config,
        collector(
            Arc::new(StaticFingerprint::new("fp-1234")),
            Arc::new(NoExtensions),
        ),
    )
    .unwrap();

    let result = client
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some(UNAVAILABLE_REASON));
}

#[tokio::test]
async fn test_fingerprint_failure_skips_request() {
    let fake = FakeDecision::new(StatusCode::OK, r#"{"allowed":true}"#);
    let addr = fake.spawn().await;

    let fingerprint = Arc::new(BrokenFingerprint {
        attempts: AtomicUsize::new(0),
    });
    let client = SecurityGateClient::new(
        &gate_config(addr),
        collector(fingerprint.clone(), Arc::new(NoExtensions)),
    )
    .unwrap();

    let result = client
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some(UNAVAILABLE_REASON));
    assert_eq!(fingerprint.attempts.load(Ordering::SeqCst), 1);
    assert!(fake.received().is_empty());
}

#[tokio::test]
async fn test_empty_email_is_denied_locally() {
    let fake = FakeDecision::new(StatusCode::OK, r#"{"allowed":true}"#);
    let addr = fake.spawn().await;

    let result = client_for(addr).check_security_before_auth("  ", true).await;

    assert!(!result.allowed());
    assert_eq!(result.reason(), Some(EMAIL_REQUIRED_REASON));
    assert!(fake.received().is_empty());
}

#[tokio::test]
async fn test_suspicious_extensions_are_reported() {
    let fake = FakeDecision::new(StatusCode::OK, r#"{"allowed":true}"#);
    let addr = fake.spawn().await;

    let client = SecurityGateClient::new(
        &gate_config(addr),
        collector(
            Arc::new(StaticFingerprint::new("fp-1234")),
            Arc::new(InstalledExtensions(&["NordVPN", "Windscribe"])),
        ),
    )
    .unwrap();

    client
        .check_security_before_auth("user@example.com", false)
        .await;

    assert_eq!(
        fake.received()[0]["suspiciousExtensions"],
        json!(["NordVPN", "Windscribe"])
    );
}

#[tokio::test]
async fn test_extension_reporting_can_be_disabled() {
    let fake = FakeDecision::new(StatusCode::OK, r#"{"allowed":true}"#);
    let addr = fake.spawn().await;

    let config = GateConfig {
        report_extensions: false,
        ..gate_config(addr)
    };
    let client = SecurityGateClient::new(
        &config,
        collector(
            Arc::new(StaticFingerprint::new("fp-1234")),
            Arc::new(InstalledExtensions(&["NordVPN"])),
        ),
    )
    .unwrap();

    client
        .check_security_before_auth("user@example.com", false)
        .await;

    assert!(fake.received()[0].get("suspiciousExtensions").is_none());
}

#[test]
fn test_invalid_decision_url_is_rejected() {
    let config = GateConfig {
        decision_url: "not a url".to_string(),
        ..GateConfig::default()
    };
    let result = SecurityGateClient::new(
        &config,
        collector(
            Arc::new(StaticFingerprint::new("fp")),
            Arc::new(NoExtensions),
        ),
    );
    assert!(matches!(result, Err(GuardError::Configuration(_))));
}
