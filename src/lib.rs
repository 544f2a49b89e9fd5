//! admission-webhook library crate
//!
//! This module exports the admission codec, handlers, dispatch layer and the
//! HTTPS server that hosts them.

pub mod config;
pub mod health;
pub mod webhooks;

pub use config::{ConfigError, WebhookConfig};
pub use health::HealthState;
pub use webhooks::{
    ServerError, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, build_dispatcher,
    run_webhook_server,
};
