//! Error types for RPC operations
//!
//! Every failure a caller can observe is an [`RpcError`] carrying a closed
//! [`RpcErrorCode`]. Consumers branch on the code, never on the message text.
//!
//! Definition-time failures (bad router shapes) are reported separately as
//! [`BuildError`], since they surface while the router is being assembled and
//! never during a call.
//!
//! # Example
//! ```rust,ignore
//! use nexus_rpc::{RpcError, RpcErrorCode};
//!
//! let error = RpcError::new(RpcErrorCode::NotFound, "User not found");
//! let error = RpcError::not_found("User not found"); // Convenience method
//! ```

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Type-safe error codes for RPC operations.
///
/// When serialized, codes use SCREAMING_SNAKE_CASE (e.g. `NotFound` becomes
/// `"NOT_FOUND"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorCode {
    // Client errors (4xx equivalent)
    /// The request was malformed, failed input validation, or used the wrong kind
    BadRequest,
    /// Authentication is required
    Unauthorized,
    /// The authenticated caller lacks permission
    Forbidden,
    /// The requested procedure or resource was not found
    NotFound,
    /// The request conflicts with current state
    Conflict,
    /// The input payload exceeds the configured size limit
    PayloadTooLarge,
    /// The operation did not finish in time
    Timeout,
    /// The caller is being rate limited
    TooManyRequests,

    // Server errors (5xx equivalent)
    /// A resolver or output contract failed on the server side
    Internal,
    /// The requested functionality is not implemented
    NotImplemented,

    // Dispatch-specific errors
    /// The call was cancelled before it completed
    Cancelled,
    /// A synchronous caller hit a step that would have to suspend
    AsyncNotSupported,
}

impl RpcErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Timeout => "TIMEOUT",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::Internal => "INTERNAL",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::Cancelled => "CANCELLED",
            Self::AsyncNotSupported => "ASYNC_NOT_SUPPORTED",
        }
    }

    /// Returns true if this is a client error (4xx equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BadRequest
                | Self::Unauthorized
                | Self::Forbidden
                | Self::NotFound
                | Self::Conflict
                | Self::PayloadTooLarge
                | Self::Timeout
                | Self::TooManyRequests
        )
    }

    /// Returns true if this is a server error (5xx equivalent).
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal | Self::NotImplemented)
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The original failure preserved behind an [`RpcError`].
pub type ErrorCause = Arc<dyn StdError + Send + Sync + 'static>;

/// RPC error with type-safe code and message.
///
/// The optional `cause` keeps the foreign error that was wrapped, so it stays
/// reachable through [`std::error::Error::source`] for diagnostics.
///
/// # Example
/// ```rust,ignore
/// use nexus_rpc::RpcError;
///
/// let error = RpcError::not_found("User not found")
///     .with_details(serde_json::json!({"user_id": 123}));
///
/// let error = RpcError::internal("Database unavailable").with_cause(io_error);
/// ```
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct RpcError {
    /// Type-safe error code
    pub code: RpcErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (JSON value)
    pub details: Option<serde_json::Value>,
    /// The wrapped original failure, if any
    #[source]
    pub cause: Option<ErrorCause>,
}

impl RpcError {
    /// Create a new error with code and message.
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            cause: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    /// Attach the original error as the cause.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attach a plain-text cause for debugging.
    pub fn with_cause_message(self, cause: impl Into<String>) -> Self {
        self.with_cause(CauseMessage(cause.into()))
    }

    /// Wrap a foreign error as INTERNAL, keeping it as the cause.
    pub fn internal_from<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::internal(err.to_string()).with_cause(err)
    }

    /// Sanitize error for client response (removes internal details for server errors).
    pub fn sanitize(mut self) -> Self {
        if matches!(self.code, RpcErrorCode::Internal) {
            self.message = "An internal error occurred".to_string();
            self.details = None;
            self.cause = None;
        }
        self
    }

    /// Returns the cause's display text, if a cause is attached.
    pub fn cause_message(&self) -> Option<String> {
        self.cause.as_ref().map(|cause| cause.to_string())
    }

    // Convenience constructors

    /// Create a NOT_FOUND error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::NotFound, message)
    }

    /// Create a BAD_REQUEST error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::BadRequest, message)
    }

    /// Create an UNAUTHORIZED error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Unauthorized, message)
    }

    /// Create a FORBIDDEN error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Forbidden, message)
    }

    /// Create an INTERNAL error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Internal, message)
    }

    /// Create a CONFLICT error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Conflict, message)
    }

    /// Create a TIMEOUT error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Timeout, message)
    }

    /// Create a PAYLOAD_TOO_LARGE error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::PayloadTooLarge, message)
    }

    /// Create a NOT_FOUND error for an unknown procedure path.
    pub fn procedure_not_found(path: &str) -> Self {
        Self::not_found(format!("Procedure '{}' not found", path))
    }

    /// Create a CANCELLED error.
    pub fn cancelled(path: &str) -> Self {
        Self::new(
            RpcErrorCode::Cancelled,
            format!("Call to '{}' was cancelled", path),
        )
    }

    /// Create an ASYNC_NOT_SUPPORTED error.
    pub fn async_not_supported(path: &str) -> Self {
        Self::new(
            RpcErrorCode::AsyncNotSupported,
            format!(
                "Procedure '{}' did not complete synchronously; use the async caller",
                path
            ),
        )
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err)).with_cause(err)
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("IO error: {}", err)).with_cause(err)
    }
}

impl Serialize for RpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = 2 + usize::from(self.details.is_some()) + usize::from(self.cause.is_some());
        let mut state = serializer.serialize_struct("RpcError", len)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(details) = &self.details {
            state.serialize_field("details", details)?;
        }
        if let Some(cause) = &self.cause {
            state.serialize_field("cause", &cause.to_string())?;
        }
        state.end()
    }
}

/// Result type alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Plain-text cause attached through [`RpcError::with_cause_message`].
#[derive(Debug, Error)]
#[error("{0}")]
struct CauseMessage(String);

/// A panic caught while a call was executing.
#[derive(Debug, Clone, Error)]
#[error("panicked: {message}")]
pub struct PanicError {
    message: String,
}

impl PanicError {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while assembling procedures and routers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Two entries flatten to the same dotted path
    #[error("duplicate procedure path '{path}'")]
    DuplicatePath {
        /// The colliding path
        path: String,
    },
    /// A router key cannot be used as a path segment
    #[error("invalid path segment '{segment}': {reason}")]
    InvalidSegment {
        /// The offending key
        segment: String,
        /// Why it was rejected
        reason: &'static str,
    },
}
