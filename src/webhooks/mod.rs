//! Admission webhooks.
//!
//! Two webhooks share one transport:
//! - `/mutate`: injects an annotation through a JSON Patch
//! - `/validate`: runs every validation policy and denies with the full list
//!   of failures

pub mod admission;
pub mod dispatch;
pub mod handlers;
pub mod kinds;
pub mod patch;
pub mod policies;
pub mod review;
mod server;
pub mod validation;

pub use admission::{AdmissionCall, AdmissionVerdict, GroupVersionResource, Operation, PatchType};
pub use dispatch::{Dispatcher, TransportError, WebhookRoute};
pub use handlers::{AdmissionHandler, AnnotationMutator, HandlerError, PolicyValidator};
pub use kinds::{KindRegistry, ResourceKind};
pub use policies::{PolicyConfig, ValidationContext};
pub use review::{DecodeError, EncodeError};
pub use server::{
    ServerError, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookState,
    create_webhook_router, load_tls_config, run_webhook_server, shutdown_gracefully,
};
pub use validation::{ValidationErrors, ValidationFailure};

use crate::config::WebhookConfig;

/// Build the route table from startup configuration.
///
/// The mutator is bound to pods, the validator to every known kind.
pub fn build_dispatcher(config: &WebhookConfig) -> Dispatcher {
    Dispatcher::new()
        .with_handler(
            WebhookRoute::Mutate,
            AnnotationMutator::new(
                KindRegistry::new([ResourceKind::Pod]),
                config.mutation_annotation.clone(),
                config.mutation_value.clone(),
            ),
        )
        .with_handler(
            WebhookRoute::Validate,
            PolicyValidator::new(KindRegistry::all(), config.policy.clone()),
        )
}
