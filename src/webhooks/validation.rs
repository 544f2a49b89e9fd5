//! Validation failure accumulation.
//!
//! Policies append to a [`ValidationErrors`] instead of returning early, so a
//! denied call reports every violated rule at once. Failures are kept in
//! evaluation order and never deduplicated.

use std::fmt;

use crate::webhooks::admission::AdmissionVerdict;

/// Separator used when joining failures into one status message
pub const FAILURE_SEPARATOR: &str = "; ";

/// HTTP-style code for a policy denial
pub const DENIED_STATUS_CODE: u16 = 403;

/// A single rule violation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Dotted path to the offending field, e.g. `metadata.annotations.team`
    pub field_path: String,
    pub message: String,
    /// Short machine-readable reason
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(
        field_path: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            reason: reason.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_path, self.message)
    }
}

/// Ordered collection of failures from one validation pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    failures: Vec<ValidationFailure>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: ValidationFailure) {
        self.failures.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationFailure> {
        self.failures.iter()
    }

    /// Aggregate message in evaluation order
    pub fn message(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(FAILURE_SEPARATOR)
    }

    /// Convert the pass into a verdict: allow when empty, 403 otherwise
    pub fn into_verdict(self, uid: &str) -> AdmissionVerdict {
        if self.failures.is_empty() {
            return AdmissionVerdict::allow(uid);
        }
        let message = self.message();
        AdmissionVerdict::deny_with_failures(uid, DENIED_STATUS_CODE, message, self.failures)
    }
}

impl Extend<ValidationFailure> for ValidationErrors {
    fn extend<I: IntoIterator<Item = ValidationFailure>>(&mut self, iter: I) {
        self.failures.extend(iter);
    }
}
