//! Startup configuration.
//!
//! Defaults are compiled in; each value can be overridden through an
//! environment variable. Configuration is read once at startup and is
//! immutable afterwards.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::webhooks::handlers::mutator::{DEFAULT_MUTATION_ANNOTATION, DEFAULT_MUTATION_VALUE};
use crate::webhooks::policies::{DEFAULT_REQUIRED_ANNOTATION, PolicyConfig};
use crate::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};

/// Default bound on reading, handling and answering one request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Default bound on an idle keep-alive connection
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;
/// Grace period for in-flight admission calls during shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
/// Default maximum accepted request body
pub const DEFAULT_MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

/// Invalid configuration value
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration for the webhook server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    pub port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
    pub shutdown_grace: Duration,
    pub max_body_bytes: usize,
    /// Annotation injected by the mutating webhook
    pub mutation_annotation: String,
    pub mutation_value: String,
    pub policy: PolicyConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: WEBHOOK_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            mutation_annotation: DEFAULT_MUTATION_ANNOTATION.to_string(),
            mutation_value: DEFAULT_MUTATION_VALUE.to_string(),
            policy: PolicyConfig::default(),
        }
    }
}

impl WebhookConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let required_annotations = match lookup("WEBHOOK_REQUIRED_ANNOTATIONS") {
            Some(raw) => parse_key_list("WEBHOOK_REQUIRED_ANNOTATIONS", &raw)?,
            None => vec![DEFAULT_REQUIRED_ANNOTATION.to_string()],
        };

        let mutation_annotation = lookup("WEBHOOK_MUTATION_ANNOTATION")
            .unwrap_or(defaults.mutation_annotation);
        if mutation_annotation.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "WEBHOOK_MUTATION_ANNOTATION",
                value: mutation_annotation,
                reason: "annotation key must not be empty".to_string(),
            });
        }

        Ok(Self {
            port: parse_var(&lookup, "WEBHOOK_PORT", defaults.port)?,
            cert_path: lookup("WEBHOOK_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cert_path),
            key_path: lookup("WEBHOOK_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path),
            request_timeout: Duration::from_secs(parse_var(
                &lookup,
                "WEBHOOK_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            idle_timeout: Duration::from_secs(parse_var(
                &lookup,
                "WEBHOOK_IDLE_TIMEOUT_SECS",
                DEFAULT_IDLE_TIMEOUT_SECS,
            )?),
            shutdown_grace: Duration::from_secs(parse_var(
                &lookup,
                "WEBHOOK_SHUTDOWN_GRACE_SECS",
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )?),
            max_body_bytes: parse_var(&lookup, "WEBHOOK_MAX_BODY_BYTES", defaults.max_body_bytes)?,
            mutation_annotation,
            mutation_value: lookup("WEBHOOK_MUTATION_VALUE").unwrap_or(defaults.mutation_value),
            policy: PolicyConfig {
                required_annotations,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}

/// Comma separated list; blank entries are dropped
fn parse_key_list(var: &'static str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let keys: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect();
    if keys.is_empty() {
        return Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: "expected at least one annotation key".to_string(),
        });
    }
    Ok(keys)
}
