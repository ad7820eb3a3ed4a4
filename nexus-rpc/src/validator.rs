//! Validator adapters
//!
//! A [`Validator`] turns a raw JSON value into a typed value or rejects it.
//! The dispatcher only ever calls [`Validator::parse`]; where the schema logic
//! comes from is up to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use nexus_rpc::validator::{self, Schema};
//!
//! // serde-driven, then `Validate` rules
//! let create_user = Schema::<CreateUserInput>::validated();
//!
//! // hand-written check
//! let id = validator::from_fn(|raw: serde_json::Value| {
//!     raw.as_u64().ok_or("expected a non-negative integer")
//! });
//! ```

use crate::validation::{Validate, ValidationError, ValidationResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

/// Parses a raw value into `T`.
///
/// The method is async so validators may suspend (look something up, call a
/// remote schema registry). Validators that suspend cannot be used through the
/// synchronous caller.
#[async_trait]
pub trait Validator<T>: Send + Sync {
    /// Parse `raw`, or describe why it was rejected.
    async fn parse(&self, raw: Value) -> Result<T, ValidationError>;
}

/// Validator backed by `serde` deserialization.
pub struct Schema<T> {
    rules: Option<fn(&T) -> ValidationResult>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Schema<T> {
    /// Deserialize only.
    pub fn new() -> Self {
        Self {
            rules: None,
            _marker: PhantomData,
        }
    }
}

impl<T: Validate> Schema<T> {
    /// Deserialize, then run the type's [`Validate`] rules.
    pub fn validated() -> Self {
        Self {
            rules: Some(T::validate),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Schema<T> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type", &std::any::type_name::<T>())
            .field("validated", &self.rules.is_some())
            .finish()
    }
}

#[async_trait]
impl<T> Validator<T> for Schema<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn parse(&self, raw: Value) -> Result<T, ValidationError> {
        let value: T = serde_json::from_value(raw)?;
        if let Some(rules) = self.rules {
            let result = rules(&value);
            if !result.is_valid() {
                return Err(ValidationError::from_result(result));
            }
        }
        Ok(value)
    }
}

/// Validator built from a synchronous closure.
pub struct FnValidator<F> {
    f: F,
}

/// Create a validator from a synchronous closure.
///
/// The closure's error type only needs to convert into [`ValidationError`],
/// so `&str`, `String` and `serde_json::Error` all work.
pub fn from_fn<T, E, F>(f: F) -> FnValidator<F>
where
    F: Fn(Value) -> Result<T, E> + Send + Sync,
    E: Into<ValidationError>,
{
    FnValidator { f }
}

#[async_trait]
impl<T, E, F> Validator<T> for FnValidator<F>
where
    T: Send + 'static,
    F: Fn(Value) -> Result<T, E> + Send + Sync,
    E: Into<ValidationError> + 'static,
{
    async fn parse(&self, raw: Value) -> Result<T, ValidationError> {
        (self.f)(raw).map_err(Into::into)
    }
}

/// Validator built from an async closure.
pub struct AsyncFnValidator<F> {
    f: F,
}

/// Create a validator from an async closure.
pub fn from_async_fn<T, E, F, Fut>(f: F) -> AsyncFnValidator<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send,
    E: Into<ValidationError>,
{
    AsyncFnValidator { f }
}

#[async_trait]
impl<T, E, F, Fut> Validator<T> for AsyncFnValidator<F>
where
    T: Send + 'static,
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<ValidationError> + 'static,
{
    async fn parse(&self, raw: Value) -> Result<T, ValidationError> {
        (self.f)(raw).await.map_err(Into::into)
    }
}
