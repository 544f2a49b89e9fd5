//! AdmissionReview codec.
//!
//! Wire types come from `kube::core::admission`. Decoding lifts the submitted
//! object out of the envelope as raw JSON before handing the rest to kube, so
//! the object is only decoded later by the handler bound to its kind. Encoding
//! builds the response from the originating request, which echoes its uid and
//! envelope apiVersion.

use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview, SerializePatchError};
use kube::core::response::{StatusCause, StatusDetails};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::webhooks::admission::{AdmissionCall, AdmissionVerdict};

/// Errors that can occur while decoding a review request
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The payload is not a well-formed AdmissionReview document
    #[error("malformed AdmissionReview: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope has no `request` object
    #[error("AdmissionReview has no request")]
    MissingRequest,

    /// The request has no `resource` triple
    #[error("admission request {uid} has no resource")]
    MissingResource { uid: String },
}

/// Errors that can occur while encoding a verdict
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    Patch(#[from] SerializePatchError),

    #[error("failed to serialize AdmissionReview: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode an AdmissionReview request body
pub fn decode(bytes: &[u8]) -> Result<AdmissionCall, DecodeError> {
    let mut envelope: Map<String, Value> = serde_json::from_slice(bytes)?;

    let request = match envelope.get_mut("request") {
        Some(Value::Object(request)) => request,
        _ => return Err(DecodeError::MissingRequest),
    };

    if request.get("resource").map_or(true, Value::is_null) {
        let uid = request
            .get("uid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(DecodeError::MissingResource { uid });
    }

    let object = request.remove("object").filter(|object| !object.is_null());
    request.remove("oldObject");

    let review: AdmissionReview<DynamicObject> = serde_json::from_value(Value::Object(envelope))?;
    let request: AdmissionRequest<DynamicObject> =
        review.try_into().map_err(|_| DecodeError::MissingRequest)?;

    Ok(AdmissionCall::new(request, object))
}

/// Build the response envelope for the verdict on `call`
pub fn response_review(
    call: &AdmissionCall,
    verdict: &AdmissionVerdict,
) -> Result<AdmissionReview<DynamicObject>, EncodeError> {
    let mut response = call.response();

    match (verdict.is_allowed(), verdict.patch()) {
        (true, Some(patch)) => response = response.with_patch(patch.clone())?,
        (true, None) => {}
        (false, _) => {
            response = response.deny(verdict.status_message().unwrap_or_default());
            response.result.reason = status_reason(verdict.status_code()).to_string();
        }
    }

    response.uid = verdict.uid().to_string();
    response.result.code = verdict.status_code();
    if !verdict.failures().is_empty() {
        response.result.details = Some(StatusDetails {
            causes: verdict
                .failures()
                .iter()
                .map(|failure| StatusCause {
                    field: failure.field_path.clone(),
                    message: failure.message.clone(),
                    reason: failure.reason.clone(),
                })
                .collect(),
            name: String::new(),
            group: String::new(),
            kind: String::new(),
            uid: String::new(),
            retry_after_seconds: 0,
        });
    }

    Ok(response.into_review())
}

/// Encode the verdict on `call` into an AdmissionReview response body
pub fn encode(call: &AdmissionCall, verdict: &AdmissionVerdict) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(&response_review(call, verdict)?)?)
}

/// `metav1.StatusReason` for a denial code
fn status_reason(code: u16) -> &'static str {
    match code {
        400 => "BadRequest",
        403 => "Forbidden",
        500 => "InternalError",
        _ => "Unknown",
    }
}

/// Decode a minimal review for `resource` with the given operation and object
#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) fn call_for(
    resource: (&str, &str, &str),
    operation: &str,
    object: Option<Value>,
) -> AdmissionCall {
    let mut request = serde_json::json!({
        "uid": "test-uid",
        "kind": {"group": resource.0, "version": resource.1, "kind": "Object"},
        "resource": {"group": resource.0, "version": resource.1, "resource": resource.2},
        "name": "web",
        "namespace": "default",
        "operation": operation,
        "userInfo": {"username": "admin"},
        "dryRun": false
    });
    if let Some(object) = object {
        request["object"] = object;
    }
    let review = serde_json::json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": request
    });
    match decode(review.to_string().as_bytes()) {
        Ok(call) => call,
        Err(e) => panic!("test review does not decode: {e}"),
    }
}
