//! Required annotation policy.
//!
//! Validates:
//! - Each configured annotation key is present on the object
//! - Its value is not empty or whitespace

use super::ValidationContext;
use crate::webhooks::validation::{ValidationErrors, ValidationFailure};

/// Reason attached to a missing annotation
pub const REASON_REQUIRED: &str = "FieldValueRequired";

/// Dotted field path reported for an annotation key
pub fn field_path(key: &str) -> String {
    format!("metadata.annotations.{}", key)
}

/// Append one failure per required annotation that is missing or empty
pub fn validate(ctx: &ValidationContext<'_>, required: &[String], errors: &mut ValidationErrors) {
    for key in required {
        match ctx.annotation(key) {
            Some(value) if !value.trim().is_empty() => {}
            Some(_) => errors.push(ValidationFailure::new(
                field_path(key),
                REASON_REQUIRED,
                format!("{} annotation '{}' must not be empty", ctx.kind, key),
            )),
            None => errors.push(ValidationFailure::new(
                field_path(key),
                REASON_REQUIRED,
                format!("{} is missing required annotation '{}'", ctx.kind, key),
            )),
        }
    }
}
