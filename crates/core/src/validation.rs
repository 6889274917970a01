//! Field-level validation failures.
//!
//! Validation never short-circuits: checks push into a [`ValidationErrors`]
//! list and the caller rejects the whole request once, with every problem
//! attached.

use serde::{Deserialize, Serialize};

/// One `{field, error}` pair as reported to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: error.into(),
        }
    }
}

/// An accumulated, non-empty-on-failure list of field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("validation failed with {} error(s)", .0.len())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Shorthand for a failure with a single error.
    #[must_use]
    pub fn single(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, error)])
    }

    pub fn push(&mut self, field: impl Into<String>, error: impl Into<String>) {
        self.0.push(FieldError::new(field, error));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<FieldError> {
        self.0
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the accumulated errors when at least one was pushed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Extend<FieldError> for ValidationErrors {
    fn extend<T: IntoIterator<Item = FieldError>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.push("request.products", "at least one product is required");
        errors.push("request.price", "must not be negative");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.len(), 2);
        assert_eq!(err.to_string(), "validation failed with 2 error(s)");
        assert_eq!(err.errors()[0].field, "request.products");
    }
}
