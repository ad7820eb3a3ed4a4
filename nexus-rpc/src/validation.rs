//! Input Validation Framework
//!
//! Field-level checks for input types (the [`Validate`] trait and the
//! [`ValidationRules`] builder), plus the router key check and the payload
//! size check the dispatcher runs on every call.
//!
//! # Example
//!
//! ```rust,ignore
//! use nexus_rpc::validation::{Validate, ValidationResult, ValidationRules};
//!
//! #[derive(Debug, Deserialize)]
//! struct CreateUserInput {
//!     name: String,
//!     email: String,
//!     age: i64,
//! }
//!
//! impl Validate for CreateUserInput {
//!     fn validate(&self) -> ValidationResult {
//!         ValidationRules::new()
//!             .required("name", &self.name)
//!             .max_length("name", &self.name, 100)
//!             .email("email", &self.email)
//!             .range("age", self.age, 0..=150)
//!             .build()
//!     }
//! }
//! ```

use crate::{BuildError, RpcError};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// The rule a field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorCode {
    /// Empty or whitespace-only
    Required,
    /// Fewer characters than allowed
    MinLength,
    /// More characters than allowed
    MaxLength,
    /// Number outside its bounds
    Range,
    /// No match for the field's pattern
    Pattern,
    /// The pattern itself does not compile
    InvalidPattern,
    /// Not an email address
    Email,
    /// A caller-defined condition
    Custom,
}

impl FieldErrorCode {
    /// Wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::MinLength => "min_length",
            Self::MaxLength => "max_length",
            Self::Range => "range",
            Self::Pattern => "pattern",
            Self::InvalidPattern => "invalid_pattern",
            Self::Email => "email",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for FieldErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Name of the field
    pub field: String,
    /// Which rule failed
    pub code: FieldErrorCode,
    /// Human-readable explanation
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(field: impl Into<String>, code: FieldErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

/// Outcome of [`Validate::validate`]: valid when it carries no errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    errors: Vec<FieldError>,
}

impl ValidationResult {
    /// A passing result.
    pub fn ok() -> Self {
        Self::default()
    }

    /// A result carrying `errors`; passing if there are none.
    pub fn from_errors(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Whether every rule passed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The failed rules, in the order they were checked.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Take the failed rules out.
    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// Failed rules grouped by field name.
    pub fn by_field(&self) -> BTreeMap<&str, Vec<&FieldError>> {
        let mut map: BTreeMap<&str, Vec<&FieldError>> = BTreeMap::new();
        for error in &self.errors {
            map.entry(error.field.as_str()).or_default().push(error);
        }
        map
    }

    /// Combine with another result.
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self
    }
}

/// Types that can check their own fields after deserialization.
///
/// Pair it with [`Schema::validated`](crate::validator::Schema::validated).
pub trait Validate {
    /// Run every rule and report what failed.
    fn validate(&self) -> ValidationResult;
}

impl Validate for () {
    fn validate(&self) -> ValidationResult {
        ValidationResult::ok()
    }
}

impl Validate for serde_json::Value {
    fn validate(&self) -> ValidationResult {
        ValidationResult::ok()
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> ValidationResult {
        self.as_ref().map_or_else(ValidationResult::ok, Validate::validate)
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> ValidationResult {
        self.iter()
            .map(Validate::validate)
            .fold(ValidationResult::ok(), ValidationResult::merge)
    }
}

/// Chainable field rules. Every rule runs; failures accumulate.
///
/// ```rust,ignore
/// let result = ValidationRules::new()
///     .required("name", &input.name)
///     .min_length("name", &input.name, 2)
///     .pattern("phone", &input.phone, r"^\+?[0-9]{10,15}$")
///     .build();
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationRules {
    errors: Vec<FieldError>,
}

impl ValidationRules {
    /// Start with no failures.
    pub fn new() -> Self {
        Self::default()
    }

    fn check(
        mut self,
        passed: bool,
        field: &str,
        code: FieldErrorCode,
        message: impl FnOnce() -> String,
    ) -> Self {
        if !passed {
            trace!(field = %field, code = %code, "Field rule failed");
            self.errors.push(FieldError::new(field, code, message()));
        }
        self
    }

    /// Record an already built failure.
    pub fn push(mut self, error: FieldError) -> Self {
        self.errors.push(error);
        self
    }

    /// `value` must contain something other than whitespace.
    pub fn required(self, field: &str, value: &str) -> Self {
        self.check(!value.trim().is_empty(), field, FieldErrorCode::Required, || {
            format!("{} is required", field)
        })
    }

    /// `value` must be at least `min` characters long.
    pub fn min_length(self, field: &str, value: &str, min: usize) -> Self {
        let len = value.chars().count();
        self.check(len >= min, field, FieldErrorCode::MinLength, || {
            format!("{} needs at least {} characters, got {}", field, min, len)
        })
    }

    /// `value` must be at most `max` characters long.
    pub fn max_length(self, field: &str, value: &str, max: usize) -> Self {
        let len = value.chars().count();
        self.check(len <= max, field, FieldErrorCode::MaxLength, || {
            format!("{} allows at most {} characters, got {}", field, max, len)
        })
    }

    /// `value` must lie within `bounds`.
    pub fn range(self, field: &str, value: i64, bounds: RangeInclusive<i64>) -> Self {
        self.check(bounds.contains(&value), field, FieldErrorCode::Range, || {
            format!(
                "{} must be between {} and {}, got {}",
                field,
                bounds.start(),
                bounds.end(),
                value
            )
        })
    }

    /// `value` must match the regular expression `pattern`.
    ///
    /// A pattern that does not compile is reported as an `invalid_pattern`
    /// failure on the field.
    pub fn pattern(self, field: &str, value: &str, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => self.matches(field, value, &re),
            Err(err) => {
                warn!(field = %field, pattern = %pattern, error = %err, "Validation pattern does not compile");
                self.push(FieldError::new(
                    field,
                    FieldErrorCode::InvalidPattern,
                    format!("Invalid validation pattern for {}: {}", field, pattern),
                ))
            }
        }
    }

    /// `value` must match the compiled `re`.
    pub fn matches(self, field: &str, value: &str, re: &Regex) -> Self {
        self.check(re.is_match(value), field, FieldErrorCode::Pattern, || {
            format!("{} must match {}", field, re.as_str())
        })
    }

    /// `value` must look like `local@domain.tld`.
    pub fn email(self, field: &str, value: &str) -> Self {
        let valid = value.rsplit_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !local.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        });
        self.check(valid, field, FieldErrorCode::Email, || {
            format!("{} must be a valid email address", field)
        })
    }

    /// `condition` must hold; `message` explains it when it does not.
    pub fn custom(self, field: &str, condition: bool, message: &str) -> Self {
        self.check(condition, field, FieldErrorCode::Custom, || message.to_string())
    }

    /// Finish and report.
    pub fn build(self) -> ValidationResult {
        if !self.errors.is_empty() {
            debug!(failed = self.errors.len(), "Validation failed");
        }
        ValidationResult::from_errors(self.errors)
    }
}

/// A rejected value, as reported by a [`Validator`](crate::validator::Validator).
///
/// The dispatcher never inspects it beyond wrapping: input rejections become
/// `BAD_REQUEST`, output rejections become `INTERNAL`, with this error kept as
/// the cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Summary of the failure
    pub message: String,
    /// Field-level errors, when the validator reports them
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Create a validation error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Create a validation error from a failed [`ValidationResult`].
    pub fn from_result(result: ValidationResult) -> Self {
        let errors = result.into_errors();
        let message = match errors.as_slice() {
            [only] => only.message.clone(),
            _ => format!("{} fields failed validation", errors.len()),
        };
        Self { message, errors }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

// =============================================================================
// Key and payload checks
// =============================================================================

fn invalid_char(segment: &str) -> Option<char> {
    segment
        .chars()
        .find(|&ch| !ch.is_ascii_alphanumeric() && ch != '_')
}

/// Validate a single router key.
///
/// A key must be non-empty and may only contain ASCII alphanumerics and
/// underscores, so `.`-joined paths can always be split back unambiguously.
pub fn validate_segment(segment: &str) -> Result<(), BuildError> {
    let reason = if segment.is_empty() {
        "segment cannot be empty"
    } else if segment.contains('.') {
        "segment cannot contain a dot; nest a router instead"
    } else if invalid_char(segment).is_some() {
        "segment may only contain ASCII letters, digits and underscores"
    } else {
        return Ok(());
    };
    Err(BuildError::InvalidSegment {
        segment: segment.to_string(),
        reason,
    })
}

/// Counts bytes instead of storing them.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Size of `input` encoded as compact JSON, without allocating the encoding.
pub fn encoded_size(input: &serde_json::Value) -> usize {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, input).map_or(usize::MAX, |()| counter.0)
}

/// Reject inputs whose JSON encoding is larger than `max_size` bytes.
pub fn validate_input_size(input: &serde_json::Value, max_size: usize) -> Result<(), RpcError> {
    let size = encoded_size(input);
    if size <= max_size {
        return Ok(());
    }
    Err(RpcError::payload_too_large(format!(
        "Input size {} bytes exceeds maximum {} bytes",
        size, max_size
    ))
    .with_details(serde_json::json!({
        "size": size,
        "max_size": max_size,
    })))
}
