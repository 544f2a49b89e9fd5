//! Annotation mutator.
//!
//! Marks every admitted object with a fixed annotation. The patch is computed
//! against the submitted object, so a call whose object already carries the
//! annotation yields no patch.

use json_patch::Patch;
use tracing::debug;

use super::{AdmissionHandler, HandlerError, decode_object};
use crate::webhooks::admission::{AdmissionCall, AdmissionVerdict};
use crate::webhooks::kinds::{KindRegistry, ResourceKind};
use crate::webhooks::patch::build_add_annotation_patch;

/// Annotation key set by default
pub const DEFAULT_MUTATION_ANNOTATION: &str = "PodModified";
/// Annotation value set by default
pub const DEFAULT_MUTATION_VALUE: &str = "true";

/// Mutating handler that injects one annotation
#[derive(Clone, Debug)]
pub struct AnnotationMutator {
    registry: KindRegistry,
    key: String,
    value: String,
}

impl AnnotationMutator {
    pub fn new(registry: KindRegistry, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            registry,
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Default for AnnotationMutator {
    /// Pods only, `PodModified: "true"`
    fn default() -> Self {
        Self::new(
            KindRegistry::new([ResourceKind::Pod]),
            DEFAULT_MUTATION_ANNOTATION,
            DEFAULT_MUTATION_VALUE,
        )
    }
}

impl AdmissionHandler for AnnotationMutator {
    fn name(&self) -> &'static str {
        "mutate"
    }

    fn decide(&self, call: &AdmissionCall) -> Result<AdmissionVerdict, HandlerError> {
        let object = match decode_object(&self.registry, call)? {
            Some(object) => object,
            None => return Ok(AdmissionVerdict::allow(&call.uid)),
        };

        let ops = build_add_annotation_patch(object.raw, &self.key, &self.value);
        debug!(
            uid = %call.uid,
            kind = %object.kind,
            patch_ops = ops.len(),
            "Computed annotation patch"
        );

        Ok(AdmissionVerdict::patched(&call.uid, Patch(ops)))
    }
}
