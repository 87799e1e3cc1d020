//! Field-level validation errors.
//!
//! Every rejected save carries a map from dotted field path
//! (`subcategories.0.author`) to the failures found at that path. Each
//! failure names the constraint that failed via [`ErrorCode`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which constraint a field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Required,
    MaxLength,
    Invalid,
    Enumeration,
    Cardinality,
    Placement,
    UnknownBlock,
    Reference,
}

/// A single failure at one field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub code: ErrorCode,
    pub message: String,
}

/// All failures found while validating one save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors holding a single failure.
    pub fn single(field: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, code, message);
        errors
    }

    /// Record a failure at `field`.
    pub fn add(&mut self, field: impl Into<String>, code: ErrorCode, message: impl Into<String>) {
        self.fields.entry(field.into()).or_default().push(FieldError {
            code,
            message: message.into(),
        });
    }

    /// Fold `other` in, prefixing each of its paths with `prefix`.
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for (path, errs) in other.fields {
            let full = join_path(prefix, &path);
            self.fields.entry(full).or_default().extend(errs);
        }
    }

    /// Fold `other` in unchanged.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.merge_prefixed("", other);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of distinct field paths with failures.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Failures recorded at exactly `field`.
    pub fn get(&self, field: &str) -> &[FieldError] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `field` failed with `code`.
    pub fn has(&self, field: &str, code: ErrorCode) -> bool {
        self.get(field).iter().any(|e| e.code == code)
    }

    /// Whether any field failed with `code`.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.fields.values().flatten().any(|e| e.code == code)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[FieldError])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Check a text field against `max` characters, and presence if `required`.
    pub fn check_text(&mut self, field: &str, value: &str, max: usize, required: bool) {
        if required && value.trim().is_empty() {
            self.add(field, ErrorCode::Required, "This field is required.");
            return;
        }
        let len = value.chars().count();
        if len > max {
            self.add(
                field,
                ErrorCode::MaxLength,
                format!("Ensure this value has at most {max} characters (it has {len})."),
            );
        }
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Join two dotted path segments, skipping empty ones.
pub fn join_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}.{path}"),
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, errs) in &self.fields {
            for err in errs {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                if field.is_empty() {
                    write!(f, "{}", err.message)?;
                } else {
                    write!(f, "{field}: {}", err.message)?;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefixed_builds_dotted_paths() {
        let mut inner = ValidationErrors::new();
        inner.add("author", ErrorCode::Enumeration, "bad author");
        inner.add("", ErrorCode::Invalid, "whole block invalid");

        let mut outer = ValidationErrors::new();
        outer.merge_prefixed("subcategories.0", inner);

        assert!(outer.has("subcategories.0.author", ErrorCode::Enumeration));
        assert!(outer.has("subcategories.0", ErrorCode::Invalid));
        assert_eq!(outer.len(), 2);
    }

    #[test]
    fn serializes_as_plain_map() {
        let errors = ValidationErrors::single("caption", ErrorCode::MaxLength, "too long");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["caption"][0]["code"], "max_length");
        assert_eq!(json["caption"][0]["message"], "too long");
    }

    #[test]
    fn display_joins_messages() {
        let mut errors = ValidationErrors::new();
        errors.add("a", ErrorCode::Required, "is required");
        errors.add("b", ErrorCode::Invalid, "is invalid");
        assert_eq!(errors.to_string(), "a: is required; b: is invalid");
    }

    #[test]
    fn into_result() {
        assert_eq!(ValidationErrors::new().into_result(3).unwrap(), 3);
        let err = ValidationErrors::single("x", ErrorCode::Required, "missing");
        assert!(err.into_result(()).is_err());
    }
}
