//! Admission call and verdict types.
//!
//! An [`AdmissionCall`] is the decoded form of one inbound review request and an
//! [`AdmissionVerdict`] is the decision returned for it. Both live only for the
//! duration of a single HTTP exchange.

use std::fmt;

use json_patch::Patch;
use kube::core::DynamicObject;
use kube::core::admission::{self, AdmissionRequest, AdmissionResponse};
use serde_json::Value;

use crate::webhooks::validation::ValidationFailure;

/// Operation that triggered the admission call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl Operation {
    /// Whether the call carries an object that handlers are expected to inspect
    pub fn carries_object(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }
}

impl From<&admission::Operation> for Operation {
    fn from(operation: &admission::Operation) -> Self {
        match operation {
            admission::Operation::Create => Operation::Create,
            admission::Operation::Update => Operation::Update,
            admission::Operation::Delete => Operation::Delete,
            admission::Operation::Connect => Operation::Connect,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Connect => "CONNECT",
        };
        f.write_str(tag)
    }
}

/// Group/version/resource triple identifying an object type
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }
}

impl From<&kube::core::GroupVersionResource> for GroupVersionResource {
    fn from(gvr: &kube::core::GroupVersionResource) -> Self {
        Self::new(&gvr.group, &gvr.version, &gvr.resource)
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Patch semantics tag carried next to a patch payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchType {
    JsonPatch,
}

/// One decoded admission request.
///
/// The submitted object is kept as raw JSON so each handler can decode it
/// against its own kind; a malformed object is then a handler fault rather
/// than an undecodable request.
#[derive(Clone, Debug)]
pub struct AdmissionCall {
    /// Correlation token assigned by the API server
    pub uid: String,
    pub resource: GroupVersionResource,
    pub operation: Operation,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub dry_run: bool,
    /// Object as submitted, absent for DELETE
    pub object: Option<Value>,
    request: AdmissionRequest<DynamicObject>,
}

impl AdmissionCall {
    pub(crate) fn new(request: AdmissionRequest<DynamicObject>, object: Option<Value>) -> Self {
        Self {
            uid: request.uid.clone(),
            resource: GroupVersionResource::from(&request.resource),
            operation: Operation::from(&request.operation),
            name: Some(request.name.clone()).filter(|name| !name.is_empty()),
            namespace: request.namespace.clone(),
            dry_run: request.dry_run,
            object,
            request,
        }
    }

    /// Envelope apiVersion, echoed on the response
    pub fn api_version(&self) -> &str {
        &self.request.types.api_version
    }

    /// Response skeleton bound to this request's uid and envelope version
    pub(crate) fn response(&self) -> AdmissionResponse {
        AdmissionResponse::from(&self.request)
    }
}

/// The decision for exactly one [`AdmissionCall`].
///
/// Constructors keep the invariants: a denied verdict never carries a patch and
/// always carries a non-empty message.
#[derive(Clone, Debug)]
pub struct AdmissionVerdict {
    uid: String,
    allowed: bool,
    patch: Option<Patch>,
    status_code: u16,
    status_message: Option<String>,
    failures: Vec<ValidationFailure>,
}

impl AdmissionVerdict {
    /// Allow the call unchanged
    pub fn allow(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            patch: None,
            status_code: 200,
            status_message: None,
            failures: Vec::new(),
        }
    }

    /// Allow the call with a mutation. An empty patch is dropped.
    pub fn patched(uid: impl Into<String>, patch: Patch) -> Self {
        let mut verdict = Self::allow(uid);
        if !patch.0.is_empty() {
            verdict.patch = Some(patch);
        }
        verdict
    }

    /// Deny the call with an HTTP-style status code and reason
    pub fn deny(uid: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "admission denied".to_string();
        }
        Self {
            uid: uid.into(),
            allowed: false,
            patch: None,
            status_code,
            status_message: Some(message),
            failures: Vec::new(),
        }
    }

    /// Deny with the individual validation failures that produced the message
    pub(crate) fn deny_with_failures(
        uid: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
        failures: Vec<ValidationFailure>,
    ) -> Self {
        let mut verdict = Self::deny(uid, status_code, message);
        verdict.failures = failures;
        verdict
    }

    /// Replace the correlation identifier
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn patch(&self) -> Option<&Patch> {
        self.patch.as_ref()
    }

    /// Format tag for the patch, present only alongside a patch
    pub fn patch_type(&self) -> Option<PatchType> {
        self.patch.as_ref().map(|_| PatchType::JsonPatch)
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }
}
