//! Test fixtures and builder patterns for AdmissionReview requests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use serde_json::{Value, json};

/// Builder for AdmissionReview request documents.
///
/// # Example
/// ```ignore
/// let body = ReviewBuilder::pod("web")
///     .uid("abc")
///     .annotation("team", "payments")
///     .to_bytes();
/// ```
#[derive(Clone, Debug)]
pub struct ReviewBuilder {
    uid: String,
    api_version: String,
    group: String,
    version: String,
    resource: String,
    kind: String,
    object_api_version: String,
    operation: String,
    name: String,
    namespace: String,
    annotations: Option<BTreeMap<String, String>>,
    object: Option<Value>,
    include_object: bool,
}

impl ReviewBuilder {
    /// A CREATE review for a Pod with no annotations.
    pub fn pod(name: impl Into<String>) -> Self {
        Self {
            uid: "test-uid".to_string(),
            api_version: "admission.k8s.io/v1".to_string(),
            group: String::new(),
            version: "v1".to_string(),
            resource: "pods".to_string(),
            kind: "Pod".to_string(),
            object_api_version: "v1".to_string(),
            operation: "CREATE".to_string(),
            name: name.into(),
            namespace: "default".to_string(),
            annotations: None,
            object: None,
            include_object: true,
        }
    }

    /// A CREATE review for a Deployment with no annotations.
    pub fn deployment(name: impl Into<String>) -> Self {
        Self {
            group: "apps".to_string(),
            resource: "deployments".to_string(),
            kind: "Deployment".to_string(),
            object_api_version: "apps/v1".to_string(),
            ..Self::pod(name)
        }
    }

    /// Set the request uid.
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Set the envelope apiVersion.
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Override the resource triple.
    pub fn resource(mut self, group: &str, version: &str, resource: &str) -> Self {
        self.group = group.to_string();
        self.version = version.to_string();
        self.resource = resource.to_string();
        self
    }

    /// Set the operation tag (CREATE, UPDATE, DELETE, CONNECT).
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Add an annotation, creating the map if needed.
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Emit an empty annotation map.
    pub fn empty_annotations(mut self) -> Self {
        self.annotations = Some(BTreeMap::new());
        self
    }

    /// Replace the generated object entirely.
    pub fn raw_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    /// Omit the object, as the API server does for DELETE.
    pub fn without_object(mut self) -> Self {
        self.include_object = false;
        self
    }

    /// The object that will be embedded in the request.
    pub fn object(&self) -> Value {
        if let Some(object) = &self.object {
            return object.clone();
        }
        let mut metadata = json!({"name": self.name, "namespace": self.namespace});
        if let Some(annotations) = &self.annotations {
            metadata["annotations"] = json!(annotations);
        }
        json!({
            "apiVersion": self.object_api_version,
            "kind": self.kind,
            "metadata": metadata
        })
    }

    /// Build the AdmissionReview document.
    pub fn build(&self) -> Value {
        let mut request = json!({
            "uid": self.uid,
            "kind": {"group": self.group, "version": self.version, "kind": self.kind},
            "resource": {"group": self.group, "version": self.version, "resource": self.resource},
            "name": self.name,
            "namespace": self.namespace,
            "operation": self.operation,
            "userInfo": {"username": "system:serviceaccount:default:deployer"},
            "dryRun": false
        });
        if self.include_object {
            request["object"] = self.object();
        }
        json!({
            "apiVersion": self.api_version,
            "kind": "AdmissionReview",
            "request": request
        })
    }

    /// Build the serialized request body.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).unwrap_or_default()
    }
}

/// Create a Pod review carrying a `team` annotation.
pub fn team_pod_review(team: &str) -> ReviewBuilder {
    ReviewBuilder::pod("web").annotation("team", team)
}

/// Decode a base64 JSON Patch from a response into its JSON form.
pub fn decode_patch(encoded: &str) -> Value {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap_or_default();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
