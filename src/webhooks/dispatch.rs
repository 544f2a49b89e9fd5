//! Request dispatch.
//!
//! Enforces the transport preconditions, drives decode -> handler -> encode and
//! turns handler faults into well-formed 500 denials. A call that gets past
//! decoding always ends in exactly one encoded verdict; everything that fails
//! before that point is a [`TransportError`].

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use axum::{
    Json,
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::health::Outcome;
use crate::webhooks::admission::{AdmissionCall, AdmissionVerdict};
use crate::webhooks::handlers::AdmissionHandler;
use crate::webhooks::review::{self, DecodeError, EncodeError};

/// The only media type accepted on admission routes
pub const ADMISSION_CONTENT_TYPE: &str = "application/json";

/// Status code for a verdict produced from a handler fault
pub const INTERNAL_ERROR_STATUS_CODE: u16 = 500;

/// Admission routes served by the webhook
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WebhookRoute {
    Mutate,
    Validate,
}

impl WebhookRoute {
    /// HTTP path the route is bound to
    pub fn path(&self) -> &'static str {
        match self {
            WebhookRoute::Mutate => "/mutate",
            WebhookRoute::Validate => "/validate",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookRoute::Mutate => "mutate",
            WebhookRoute::Validate => "validate",
        }
    }
}

impl fmt::Display for WebhookRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures surfaced at the transport boundary, before any verdict exists
#[derive(Error, Debug)]
pub enum TransportError {
    /// Content type missing or not `application/json`
    #[error("unsupported content type {0:?}, expected application/json")]
    UnsupportedMediaType(Option<String>),

    /// Request body could not be read
    #[error("failed to read request body: {0}")]
    Body(#[from] BytesRejection),

    /// Request body was empty
    #[error("request body is empty")]
    EmptyBody,

    /// Body is not a usable AdmissionReview
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// No handler registered for the route
    #[error("no handler registered for {0}")]
    NoHandler(WebhookRoute),

    /// Verdict could not be serialized
    #[error("failed to encode admission response: {0}")]
    Encode(#[from] EncodeError),
}

impl TransportError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TransportError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TransportError::Body(rejection) => rejection.status(),
            TransportError::EmptyBody | TransportError::Decode(_) => StatusCode::BAD_REQUEST,
            TransportError::NoHandler(_) => StatusCode::NOT_FOUND,
            TransportError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// A verdict together with its encoded response body
#[derive(Debug)]
pub struct Admitted {
    pub verdict: AdmissionVerdict,
    pub body: Vec<u8>,
}

impl Admitted {
    /// Metrics outcome for this verdict
    pub fn outcome(&self) -> Outcome {
        if self.verdict.is_allowed() {
            Outcome::Allowed
        } else if self.verdict.status_code() >= INTERNAL_ERROR_STATUS_CODE {
            Outcome::Error
        } else {
            Outcome::Denied
        }
    }
}

/// Maps routes to handlers; built once at startup and shared read-only
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: BTreeMap<WebhookRoute, Arc<dyn AdmissionHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a route, replacing any previous binding
    pub fn with_handler(mut self, route: WebhookRoute, handler: impl AdmissionHandler + 'static) -> Self {
        self.handlers.insert(route, Arc::new(handler));
        self
    }

    /// Routes that have a handler bound
    pub fn routes(&self) -> impl Iterator<Item = WebhookRoute> + '_ {
        self.handlers.keys().copied()
    }

    /// Run the full pipeline for one request body
    pub fn handle(
        &self,
        route: WebhookRoute,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Admitted, TransportError> {
        let handler = self
            .handlers
            .get(&route)
            .ok_or(TransportError::NoHandler(route))?;

        if !is_json_content_type(content_type) {
            return Err(TransportError::UnsupportedMediaType(
                content_type.map(str::to_string),
            ));
        }

        if body.is_empty() {
            return Err(TransportError::EmptyBody);
        }

        let call = review::decode(body)?;
        debug!(
            uid = %call.uid,
            route = %route,
            api_version = call.api_version(),
            operation = %call.operation,
            resource = %call.resource,
            namespace = ?call.namespace,
            name = ?call.name,
            dry_run = call.dry_run,
            "Processing admission request"
        );

        let verdict = decide(handler.as_ref(), &call);
        let body = review::encode(&call, &verdict)?;

        Ok(Admitted { verdict, body })
    }
}

/// Invoke a handler and normalize its result into a verdict for `call`.
///
/// Faults (including panics) become 500 denials. The verdict's identifier is
/// always overwritten with the call's.
pub fn decide(handler: &dyn AdmissionHandler, call: &AdmissionCall) -> AdmissionVerdict {
    let result = catch_unwind(AssertUnwindSafe(|| handler.decide(call)));

    let verdict = match result {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            error!(
                uid = %call.uid,
                handler = handler.name(),
                error = %e,
                "Admission handler failed"
            );
            AdmissionVerdict::deny(&call.uid, INTERNAL_ERROR_STATUS_CODE, e.to_string())
        }
        Err(_) => {
            error!(uid = %call.uid, handler = handler.name(), "Admission handler panicked");
            AdmissionVerdict::deny(
                &call.uid,
                INTERNAL_ERROR_STATUS_CODE,
                format!("internal error in {} handler", handler.name()),
            )
        }
    };

    let verdict = verdict.with_uid(&call.uid);

    if verdict.is_allowed() {
        info!(
            uid = %call.uid,
            handler = handler.name(),
            patched = verdict.patch().is_some(),
            "Admission request allowed"
        );
    } else {
        warn!(
            uid = %call.uid,
            handler = handler.name(),
            code = verdict.status_code(),
            reason = verdict.status_message().unwrap_or_default(),
            "Admission request denied"
        );
    }

    verdict
}

/// `application/json`, optionally with parameters such as charset
fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case(ADMISSION_CONTENT_TYPE))
        .unwrap_or(false)
}
