//! Policy validator.
//!
//! Runs every policy in [`policies::validate_all`] and folds the accumulated
//! failures into a single verdict.

use tracing::debug;

use super::{AdmissionHandler, HandlerError, decode_object};
use crate::webhooks::admission::{AdmissionCall, AdmissionVerdict};
use crate::webhooks::kinds::KindRegistry;
use crate::webhooks::policies::{self, PolicyConfig, ValidationContext};

/// Validating handler; never patches
#[derive(Clone, Debug)]
pub struct PolicyValidator {
    registry: KindRegistry,
    config: PolicyConfig,
}

impl PolicyValidator {
    pub fn new(registry: KindRegistry, config: PolicyConfig) -> Self {
        Self { registry, config }
    }
}

impl Default for PolicyValidator {
    /// All known kinds, `team` annotation required
    fn default() -> Self {
        Self::new(KindRegistry::all(), PolicyConfig::default())
    }
}

impl AdmissionHandler for PolicyValidator {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn decide(&self, call: &AdmissionCall) -> Result<AdmissionVerdict, HandlerError> {
        let object = match decode_object(&self.registry, call)? {
            Some(object) => object,
            None => return Ok(AdmissionVerdict::allow(&call.uid)),
        };

        let ctx = ValidationContext {
            kind: object.kind,
            metadata: &object.metadata,
        };

        let errors = policies::validate_all(&ctx, &self.config);
        debug!(
            uid = %call.uid,
            kind = %object.kind,
            failures = errors.len(),
            "Validation pass complete"
        );

        Ok(errors.into_verdict(&call.uid))
    }
}
