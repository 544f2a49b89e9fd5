//! Validation policies for admitted objects.
//!
//! Every policy runs on every call and appends its failures to a shared
//! [`ValidationErrors`]; nothing short-circuits, so a denial lists all
//! violations in policy order. New policies are added to [`validate_all`].

pub mod required_annotations;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::webhooks::kinds::ResourceKind;
use crate::webhooks::validation::ValidationErrors;

/// Annotation every object must carry unless configured otherwise
pub const DEFAULT_REQUIRED_ANNOTATION: &str = "team";

/// Read-only policy configuration, fixed at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Annotation keys that must be present with a non-empty value
    pub required_annotations: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            required_annotations: vec![DEFAULT_REQUIRED_ANNOTATION.to_string()],
        }
    }
}

/// Context for validation
pub struct ValidationContext<'a> {
    /// Kind of the object being validated
    pub kind: ResourceKind,
    /// Metadata of the submitted object
    pub metadata: &'a ObjectMeta,
}

impl<'a> ValidationContext<'a> {
    /// Look up an annotation on the submitted object
    pub fn annotation(&self, key: &str) -> Option<&'a str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }
}

/// Run all validation policies
pub fn validate_all(ctx: &ValidationContext<'_>, config: &PolicyConfig) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    required_annotations::validate(ctx, &config.required_annotations, &mut errors);

    errors
}
