pub mod captcha;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod infra;
pub mod logging;
pub mod policy;
pub mod signals;

pub use captcha::{CaptchaProvider, CaptchaVerifyService, TurnstileProvider};
pub use config::ServerConfig;
pub use error::{GuardError, Result};
pub use gate::{SecurityCheckResult, SecurityCheckType, SecurityGateClient};
pub use http::{HttpServer, HttpServerState};
pub use policy::SecurityPolicy;
pub use signals::{DeviceSignalCollector, DeviceSignals};
