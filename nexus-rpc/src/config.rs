//! Configuration for dispatchers and callers.
//!
//! # Example
//! ```rust,ignore
//! use nexus_rpc::RpcConfig;
//!
//! let config = RpcConfig::new()
//!     .with_max_input_size(512 * 1024)
//!     .with_debug_logging(true)
//!     .with_sanitize_errors(true);
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by [`RpcConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    /// max_input_size must be greater than 0
    #[error("max_input_size must be greater than 0")]
    InvalidMaxInputSize,
}

/// Dispatch configuration.
///
/// All fields have defaults that work out of the box.
///
/// * `max_input_size` - Maximum raw input size in bytes. Larger inputs are
///   rejected with `PAYLOAD_TOO_LARGE` before validation runs. Default: 1MB.
///
/// * `debug_logging` - Log every completed call at `debug` instead of `trace`.
///   Default: false.
///
/// * `sanitize_errors` - Strip messages, details and causes from `INTERNAL`
///   errors before callers return them. Default: false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Maximum input JSON size in bytes (default: 1MB)
    pub max_input_size: usize,
    /// Enable debug logging (default: false)
    pub debug_logging: bool,
    /// Sanitize internal errors returned to callers (default: false)
    pub sanitize_errors: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_input_size: 1024 * 1024, // 1MB
            debug_logging: false,
            sanitize_errors: false,
        }
    }
}

impl RpcConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the configuration for values the dispatcher cannot work with.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_input_size == 0 {
            return Err(ConfigValidationError::InvalidMaxInputSize);
        }
        Ok(())
    }

    /// Set the maximum input size in bytes.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Enable or disable debug logging.
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Enable or disable sanitizing of internal errors.
    pub fn with_sanitize_errors(mut self, enabled: bool) -> Self {
        self.sanitize_errors = enabled;
        self
    }
}
