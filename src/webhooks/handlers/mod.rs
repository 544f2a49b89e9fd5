//! Admission handlers.
//!
//! A handler turns one [`AdmissionCall`] into either a verdict or a
//! [`HandlerError`]. Policy denials are verdicts (403); a `HandlerError` is a
//! processing fault that dispatch converts into a 500 denial.
//!
//! Both handlers follow the same three stages: type-check the resource
//! against their registry, decode the object, decide.

pub mod mutator;
pub mod validator;

pub use mutator::AnnotationMutator;
pub use validator::PolicyValidator;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;
use thiserror::Error;

use crate::webhooks::admission::{AdmissionCall, AdmissionVerdict, GroupVersionResource};
use crate::webhooks::kinds::{KindRegistry, ResourceKind};

/// Processing faults raised by a handler
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The call targets a resource this handler is not bound to
    #[error("unsupported resource {resource}")]
    UnsupportedResource { resource: GroupVersionResource },

    /// CREATE or UPDATE without an object
    #[error("{operation} request for {resource} carries no object")]
    MissingObject {
        operation: String,
        resource: GroupVersionResource,
    },

    /// The object does not decode as the expected kind
    #[error("malformed {kind} object: {source}")]
    MalformedObject {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },
}

/// A decision function bound to one webhook route
pub trait AdmissionHandler: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Decide on a single call
    fn decide(&self, call: &AdmissionCall) -> Result<AdmissionVerdict, HandlerError>;
}

/// Object ready for a decision
pub(crate) struct DecodedObject<'a> {
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    /// The object as submitted, which patches are computed against
    pub raw: &'a Value,
}

/// Type-check and decode stages shared by both handlers.
///
/// Returns `Ok(None)` when the operation carries nothing to inspect.
pub(crate) fn decode_object<'a>(
    registry: &KindRegistry,
    call: &'a AdmissionCall,
) -> Result<Option<DecodedObject<'a>>, HandlerError> {
    let kind = registry
        .resolve(&call.resource)
        .ok_or_else(|| HandlerError::UnsupportedResource {
            resource: call.resource.clone(),
        })?;

    if !call.operation.carries_object() {
        return Ok(None);
    }

    let raw = call
        .object
        .as_ref()
        .ok_or_else(|| HandlerError::MissingObject {
            operation: call.operation.to_string(),
            resource: call.resource.clone(),
        })?;

    let metadata = kind
        .decode_metadata(raw)
        .map_err(|source| HandlerError::MalformedObject { kind, source })?;

    Ok(Some(DecodedObject { kind, metadata, raw }))
}
