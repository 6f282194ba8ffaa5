#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chatguard::captcha::{CaptchaProvider, SiteverifyRequest, TurnstileVerifyResponse};
use chatguard::error::Result;
use serde_json::Value;
use tokio::net::TcpListener;

/// 在 127.0.0.1 随机端口上启动一个 axum 服务，返回监听地址
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// 返回一个当前没有任何进程监听的地址
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// 预设结果、记录调用的验证码服务方
pub struct MockCaptchaProvider {
    reply: Box<dyn Fn() -> Result<TurnstileVerifyResponse> + Send + Sync>,
    calls: Mutex<Vec<SiteverifyRequest>>,
}

impl MockCaptchaProvider {
    pub fn replying<F>(reply: F) -> Arc<Self>
    where
        F: Fn() -> Result<TurnstileVerifyResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<SiteverifyRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CaptchaProvider for MockCaptchaProvider {
    async fn siteverify(&self, request: &SiteverifyRequest) -> Result<TurnstileVerifyResponse> {
        self.calls.lock().unwrap().push(request.clone());
        (self.reply)()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
