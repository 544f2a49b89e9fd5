//! admission-webhook - mutating and validating admission webhook server.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Starts the HTTPS webhook server
//! - Drains in-flight calls on SIGTERM/SIGINT

use std::sync::Arc;

use axum_server::Handle;
use tokio::signal;
use tracing::{error, info};

use admission_webhook::webhooks::{WebhookState, shutdown_gracefully};
use admission_webhook::{HealthState, WebhookConfig, build_dispatcher, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("admission_webhook=info".parse()?),
        )
        .json()
        .init();

    info!("Starting admission-webhook");

    let config = WebhookConfig::from_env()?;

    // Certificates are provisioned externally; without them there is nothing to serve
    for path in [&config.cert_path, &config.key_path] {
        if !path.exists() {
            error!(path = %path.display(), "Webhook TLS material not found");
            return Err(format!("missing TLS file {}", path.display()).into());
        }
    }

    info!(
        port = config.port,
        required_annotations = ?config.policy.required_annotations,
        mutation_annotation = %config.mutation_annotation,
        "Loaded webhook configuration"
    );

    let health_state = Arc::new(HealthState::new());
    let state = Arc::new(WebhookState::new(
        build_dispatcher(&config),
        health_state.clone(),
    ));
    let handle = Handle::new();

    // Flip readiness and start draining once a shutdown signal arrives
    let shutdown_handle = {
        let handle = handle.clone();
        let health_state = health_state.clone();
        let grace = config.shutdown_grace;
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Received shutdown signal, initiating graceful shutdown...");
            health_state.set_ready(false).await;
            shutdown_gracefully(&handle, grace);
        })
    };

    // Mark ready once the listener is bound
    {
        let handle = handle.clone();
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Some(addr) = handle.listening().await {
                info!(%addr, "Webhook server accepting connections");
                health_state.set_ready(true).await;
            }
        });
    }

    let result = run_webhook_server(&config, state, handle).await;
    shutdown_handle.abort();

    if let Err(e) = result {
        error!(error = %e, "Webhook server error");
        return Err(e.into());
    }

    info!("Webhook server stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the server cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
