//! Aggregated validation results.
//!
//! Workflow checks never stop at the first problem. Every missing or
//! malformed input and every uniqueness conflict is pushed onto a
//! [`ValidationErrors`] list, and the caller fails once with the whole list.

use std::fmt;

use serde::Serialize;

/// Category of a single validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    /// A field required by the target state was not supplied.
    Missing,
    /// A field was supplied but is malformed or not allowed.
    Invalid,
    /// A value is already claimed by a different identity.
    Conflict,
}

/// One human-readable validation message, optionally tied to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: Option<String>,
    pub kind: ValidationKind,
    pub message: String,
}

/// An ordered list of validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A required field was not given. Not tied to a field key so it
    /// reports as a request-level message.
    pub fn push_missing(&mut self, message: impl Into<String>) {
        self.0.push(ValidationError {
            field: None,
            kind: ValidationKind::Missing,
            message: message.into(),
        });
    }

    pub fn push_invalid(&mut self, field: Option<&str>, message: impl Into<String>) {
        self.0.push(ValidationError {
            field: field.map(str::to_string),
            kind: ValidationKind::Invalid,
            message: message.into(),
        });
    }

    pub fn push_conflict(&mut self, message: impl Into<String>) {
        self.0.push(ValidationError {
            field: None,
            kind: ValidationKind::Conflict,
            message: message.into(),
        });
    }

    /// Append every message from `other`, preserving order.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// All messages in insertion order.
    pub fn messages(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.message.as_str()).collect()
    }

    /// True when the list is non-empty and every entry is a conflict.
    pub fn is_conflict_only(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|e| e.kind == ValidationKind::Conflict)
    }

    /// `Ok(value)` when nothing was collected, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Convert `validator` derive output into aggregated messages.
    ///
    /// Field order follows the field name so responses are deterministic.
    pub fn from_field_errors(errors: &validator::ValidationErrors) -> Self {
        let mut out = Self::new();
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for (field, errs) in fields {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {field}."));
                out.push_invalid(Some(field.as_ref()), message);
            }
        }
        out
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join(" "))
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn empty_list_is_ok() {
        assert_eq!(ValidationErrors::new().into_result(5), Ok(5));
    }

    #[test]
    fn display_concatenates_messages() {
        let mut errors = ValidationErrors::new();
        errors.push_missing("No username is given.");
        errors.push_missing("No cluster_uid is given.");
        assert_eq!(
            errors.to_string(),
            "No username is given. No cluster_uid is given."
        );
    }

    #[test]
    fn conflict_only_requires_every_entry_to_conflict() {
        let mut errors = ValidationErrors::new();
        assert!(!errors.is_conflict_only());
        errors.push_conflict("A user with username bob already exists.");
        assert!(errors.is_conflict_only());
        errors.push_missing("No cluster_uid is given.");
        assert!(!errors.is_conflict_only());
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Justification may not be blank."))]
        justification: String,
    }

    #[test]
    fn field_errors_keep_their_messages() {
        let sample = Sample {
            justification: String::new(),
        };
        let errs = sample.validate().unwrap_err();
        let converted = ValidationErrors::from_field_errors(&errs);
        assert_eq!(converted.messages(), vec!["Justification may not be blank."]);
        let first = converted.iter().next().unwrap();
        assert_eq!(first.field.as_deref(), Some("justification"));
        assert_eq!(first.kind, ValidationKind::Invalid);
    }
}
