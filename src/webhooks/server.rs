//! Admission webhook server.
//!
//! Serves the admission routes together with the health routes over HTTPS.
//!
//! To enable the webhook:
//! 1. Provision a TLS certificate for the webhook Service (e.g. cert-manager)
//! 2. Mount the certificate secret at /etc/webhook/certs/
//! 3. Register the `/mutate` and `/validate` paths in a
//!    MutatingWebhookConfiguration / ValidatingWebhookConfiguration
//!
//! Startup fails when the certificate or key cannot be loaded.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::rt::TokioTimer;
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info, warn};

use crate::config::WebhookConfig;
use crate::health::{self, HealthState, Outcome};
use crate::webhooks::dispatch::{Dispatcher, TransportError, WebhookRoute};

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Concurrent HTTP/2 streams accepted on one connection
pub const MAX_CONCURRENT_STREAMS: u32 = 64;

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum ServerError {
    /// Certificate or key could not be read
    #[error("failed to read {path}: {source}")]
    ReadPem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PEM file contained no usable private key
    #[error("no private key found in {0}")]
    MissingKey(String),

    /// PEM file contained no certificates
    #[error("no certificates found in {0}")]
    MissingCertificate(String),

    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] rustls::Error),

    /// Server error
    #[error("webhook server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub dispatcher: Dispatcher,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(dispatcher: Dispatcher, health: Arc<HealthState>) -> Self {
        Self { dispatcher, health }
    }
}

/// Create the webhook router.
///
/// Every route bound in the dispatcher is served with `POST`; other methods
/// get 405 without reaching the dispatcher. Health routes are merged in.
pub fn create_webhook_router(state: Arc<WebhookState>, config: &WebhookConfig) -> Router {
    let mut router = Router::new();
    for route in state.dispatcher.routes() {
        router = router.route(
            route.path(),
            post(
                move |State(state): State<Arc<WebhookState>>,
                      headers: HeaderMap,
                      body: Result<Bytes, BytesRejection>| async move {
                    serve_admission(&state, route, &headers, body)
                },
            ),
        );
    }

    router
        .with_state(state.clone())
        .merge(health::create_router(state.health.clone()))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout))
}

/// Answer one admission request and record its outcome
fn serve_admission(
    state: &WebhookState,
    route: WebhookRoute,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let started = Instant::now();
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    let result = body
        .map_err(TransportError::from)
        .and_then(|body| state.dispatcher.handle(route, content_type, &body));

    let (outcome, response) = match result {
        Ok(admitted) => (
            admitted.outcome(),
            (
                StatusCode::OK,
                [(CONTENT_TYPE, "application/json")],
                admitted.body,
            )
                .into_response(),
        ),
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                error!(route = %route, %status, error = %e, "Failed to answer admission request");
            } else {
                warn!(route = %route, %status, error = %e, "Rejected admission request");
            }
            (Outcome::Rejected, e.into_response())
        }
    };

    state
        .health
        .metrics
        .record_request(route.as_str(), outcome, started.elapsed().as_secs_f64());
    response
}

/// Load the PEM certificate chain and key into a TLS 1.3 only rustls config
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, ServerError> {
    let read_error = |path: &Path| {
        let path = path.display().to_string();
        move |source: std::io::Error| ServerError::ReadPem { path, source }
    };

    let mut cert_reader = BufReader::new(File::open(cert_path).map_err(read_error(cert_path))?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .map_err(read_error(cert_path))?;
    if certs.is_empty() {
        return Err(ServerError::MissingCertificate(
            cert_path.display().to_string(),
        ));
    }

    let mut key_reader = BufReader::new(File::open(key_path).map_err(read_error(key_path))?);
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_reader)
        .map_err(read_error(key_path))?
        .ok_or_else(|| ServerError::MissingKey(key_path.display().to_string()))?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

/// Run the webhook server with TLS until `handle` is shut down.
///
/// Per-connection bounds apply to both protocols offered over ALPN. Each request
/// must complete within `config.request_timeout`. An HTTP/1.1 keep-alive
/// connection is closed when no new request headers arrive within
/// `config.idle_timeout`. An HTTP/2 connection is pinged every
/// `config.idle_timeout`, dropped when a ping goes unanswered for
/// `config.request_timeout`, and carries at most [`MAX_CONCURRENT_STREAMS`]
/// streams.
pub async fn run_webhook_server(
    config: &WebhookConfig,
    state: Arc<WebhookState>,
    handle: Handle,
) -> Result<(), ServerError> {
    let tls = load_tls_config(&config.cert_path, &config.key_path)?;
    let app = create_webhook_router(state, config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Webhook server listening with TLS");

    let mut server = axum_server::bind_rustls(addr, RustlsConfig::from_config(Arc::new(tls)))
        .handle(handle);
    server
        .http_builder()
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(config.idle_timeout);
    server
        .http_builder()
        .http2()
        .timer(TokioTimer::new())
        .keep_alive_interval(config.idle_timeout)
        .keep_alive_timeout(config.request_timeout)
        .max_concurrent_streams(MAX_CONCURRENT_STREAMS);

    server
        .serve(app.into_make_service())
        .await
        .map_err(ServerError::Server)?;

    Ok(())
}

/// Stop accepting connections and give in-flight calls `grace` to finish
pub fn shutdown_gracefully(handle: &Handle, grace: Duration) {
    info!(grace_secs = grace.as_secs(), "Draining in-flight admission requests");
    handle.graceful_shutdown(Some(grace));
}
