#![warn(missing_docs)]
//! # Nexus RPC
//!
//! Procedure routers with middleware, validation and in-process callers.
//!
//! ## Overview
//!
//! - **Procedure builder**: every step returns a new immutable builder, so
//!   partially configured builders can be shared as prefixes
//! - **Middleware chain** with explicit context threading: each step hands the
//!   next one a context, or aborts the call with an [`RpcError`]
//! - **Routers** that nest and flatten into dotted paths (`post.delete`)
//! - **Dispatcher** that resolves a path, checks the call kind, validates input
//!   and output, and honours a cancellation signal
//! - **Synchronous caller** that runs a call in place and fails with
//!   `ASYNC_NOT_SUPPORTED` instead of blocking
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ ProcedureBuilder │────▶│  Procedure   │────▶│      Router       │
//! │ middleware/input │     │ (immutable)  │     │ path -> procedure │
//! └──────────────────┘     └──────────────┘     └─────────┬─────────┘
//!                                                         │
//!                        ┌────────────────────────────────┤
//!                        ▼                                ▼
//!               ┌──────────────────┐            ┌──────────────────┐
//!               │ SyncCaller /     │───────────▶│    Dispatcher    │
//!               │ AsyncCaller      │            │ input → chain →  │
//!               └──────────────────┘            │ resolver → output│
//!                                               └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nexus_rpc::prelude::*;
//!
//! #[derive(Clone, Default)]
//! struct AppContext {
//!     foo: Option<String>,
//! }
//!
//! let authed = procedure::<AppContext>().use_middleware(|ctx, _req, next| async move {
//!     if ctx.foo.is_none() {
//!         return Err(RpcError::unauthorized("You are not authorized"));
//!     }
//!     Ok(next.proceed(ctx))
//! });
//!
//! let app = router([
//!     ("hello", procedure().query(|_ctx, ()| async { Ok("world") }).into()),
//!     ("foo", authed.query(|ctx, ()| async move { Ok(ctx.foo.clone()) }).into()),
//! ])?;
//!
//! let caller = app.create_sync_caller(AppContext { foo: Some("bar".into()) });
//! assert_eq!(caller.procedure("hello")?.call()?, "world");
//! assert_eq!(caller.procedure("foo")?.call()?, "bar");
//! ```
//!
//! ## Error Handling
//!
//! Every failure is an [`RpcError`] with a closed [`RpcErrorCode`]. Foreign
//! failures (validator errors, serialization errors, panics) are wrapped once
//! and kept as the error's `cause`:
//!
//! | Code | Raised by |
//! |------|-----------|
//! | `BAD_REQUEST` | kind mismatch, rejected input |
//! | `NOT_FOUND` | unknown or malformed path |
//! | `PAYLOAD_TOO_LARGE` | input over [`RpcConfig::max_input_size`] |
//! | `INTERNAL` | resolver failures, rejected output, misused continuation, panics |
//! | `CANCELLED` | dispatch with a fired [`CancellationSignal`] |
//! | `ASYNC_NOT_SUPPORTED` | [`SyncCaller`] when a call would have to wait |
//!
//! Definition-time problems (duplicate paths, invalid keys) are [`BuildError`]s.

pub mod caller;
mod config;
mod context;
pub mod dispatch;
mod error;
pub mod middleware;
pub mod procedure;
pub mod router;
pub mod validation;
pub mod validator;

#[cfg(test)]
mod tests;

// Public API
pub use caller::{
    AsyncCaller, AsyncProcedure, CallerNode, CallerTree, SyncCaller, SyncProcedure,
    TypedAsyncProcedure, TypedSyncProcedure,
};
pub use config::{ConfigValidationError, RpcConfig};
pub use context::{Context, ContextFactory, EmptyContext};
pub use dispatch::{CancellationSignal, Dispatcher, Settlement, dispatch, settle};
pub use error::{BuildError, ErrorCause, PanicError, RpcError, RpcErrorCode, RpcResult};
pub use middleware::{
    CallId, Middleware, MiddlewareFn, MiddlewareResult, Next, Proceed, ProcedureType, Request,
};
pub use procedure::{Procedure, ProcedureBuilder, procedure};
pub use router::{Router, RouterBuilder, RouterNode, router};
pub use validation::{
    FieldError, FieldErrorCode, Validate, ValidationError, ValidationResult, ValidationRules,
};
pub use validator::{Schema, Validator};

/// Prelude for convenient imports
///
/// ```rust,ignore
/// use nexus_rpc::prelude::*;
/// ```
pub mod prelude {
    // Procedures and routers
    pub use crate::{Procedure, ProcedureType, Router, procedure, router};

    // Context and middleware
    pub use crate::{Context, ContextFactory, EmptyContext, MiddlewareResult, Next, Request};

    // Dispatch and callers
    pub use crate::{AsyncCaller, CancellationSignal, Dispatcher, RpcConfig, SyncCaller};

    // Validation
    pub use crate::{
        FieldError, Schema, Validate, ValidationResult, ValidationRules, Validator,
    };

    // Errors
    pub use crate::{RpcError, RpcErrorCode, RpcResult};
}
