//! Middleware support for request processing
//!
//! A middleware receives the accumulated context, the request and a [`Next`]
//! continuation. It either proceeds with a context for the next step or aborts
//! with an [`RpcError`](crate::RpcError):
//!
//! ```rust,ignore
//! let authed = procedure::<AppContext>().use_middleware(|ctx, _req, next| async move {
//!     let Some(token) = ctx.token.clone() else {
//!         return Err(RpcError::unauthorized("Sign in first"));
//!     };
//!     let user = lookup_user(&token);
//!     Ok(next.proceed(ctx.derive(|c| AppContext { user: Some(user), ..c.clone() })))
//! });
//! ```
//!
//! [`Next`] is consumed by value and a [`Proceed`] can only be made from one,
//! so a step cannot continue twice and cannot return without deciding. A
//! token that belongs to another call or another step is rejected at run time
//! with `INTERNAL`.

use crate::{Context, RpcError, RpcResult};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Type of procedure being called
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureType {
    /// Read-only operation
    Query,
    /// Write operation
    Mutation,
    /// Event source, invoked once per call
    Subscription,
}

impl fmt::Display for ProcedureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Mutation => write!(f, "mutation"),
            Self::Subscription => write!(f, "subscription"),
        }
    }
}

/// Identifier for one dispatch, recorded on every log event of that call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    /// Generate a new time-ordered call id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Request information passed to middleware
#[derive(Clone, Debug)]
pub struct Request {
    /// Id of the call this request belongs to
    pub call_id: CallId,
    /// Full path of the procedure (e.g., "post.delete")
    pub path: String,
    /// Type of procedure
    pub procedure_type: ProcedureType,
    /// Raw input, before validation
    pub input: serde_json::Value,
}

impl Request {
    /// Get the namespace (first part of path)
    pub fn namespace(&self) -> Option<&str> {
        self.path.split('.').next()
    }

    /// Get the procedure name (last part of path)
    pub fn procedure(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// Continuation handed to a middleware step.
///
/// Not `Clone`: proceeding consumes it.
pub struct Next<Ctx: Clone + Send + Sync + 'static> {
    call_id: CallId,
    step: usize,
    _ctx: std::marker::PhantomData<fn(Ctx)>,
}

impl<Ctx: Clone + Send + Sync + 'static> Next<Ctx> {
    pub(crate) fn new(call_id: CallId, step: usize) -> Self {
        Self {
            call_id,
            step,
            _ctx: std::marker::PhantomData,
        }
    }

    /// Continue with `ctx` as the next step's context.
    pub fn proceed(self, ctx: Context<Ctx>) -> Proceed<Ctx> {
        Proceed {
            call_id: self.call_id,
            step: self.step,
            ctx,
        }
    }

    /// Continue with a freshly built context value.
    pub fn proceed_with(self, ctx: Ctx) -> Proceed<Ctx> {
        self.proceed(Context::new(ctx))
    }

    /// Zero-based position of the step this continuation belongs to.
    pub fn step(&self) -> usize {
        self.step
    }
}

impl<Ctx: Clone + Send + Sync + 'static> fmt::Debug for Next<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("call_id", &self.call_id)
            .field("step", &self.step)
            .finish()
    }
}

/// Proof that a middleware step continued.
#[must_use = "return the Proceed from the middleware to continue the chain"]
pub struct Proceed<Ctx: Clone + Send + Sync + 'static> {
    call_id: CallId,
    step: usize,
    ctx: Context<Ctx>,
}

impl<Ctx: Clone + Send + Sync + 'static> Proceed<Ctx> {
    /// The context handed to the next step.
    pub fn context(&self) -> &Context<Ctx> {
        &self.ctx
    }

    /// Unwrap the context, checking that the token belongs to this step.
    pub(crate) fn into_context(self, call_id: CallId, step: usize) -> RpcResult<Context<Ctx>> {
        if self.call_id != call_id || self.step != step {
            warn!(
                call_id = %call_id,
                step = step,
                token_call_id = %self.call_id,
                token_step = self.step,
                "Middleware continued with a foreign continuation"
            );
            return Err(RpcError::internal(format!(
                "Middleware step {} continued with a continuation that does not belong to it",
                step
            )));
        }
        Ok(self.ctx)
    }
}

impl<Ctx: Clone + Send + Sync + 'static> fmt::Debug for Proceed<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proceed")
            .field("call_id", &self.call_id)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

/// What a middleware step resolves to.
pub type MiddlewareResult<Ctx> = RpcResult<Proceed<Ctx>>;

/// Middleware function type
pub type MiddlewareFn<Ctx> = Arc<
    dyn Fn(Context<Ctx>, Request, Next<Ctx>) -> BoxFuture<'static, MiddlewareResult<Ctx>>
        + Send
        + Sync,
>;

/// Trait for implementing custom middleware
///
/// Any `Fn(Context<Ctx>, Request, Next<Ctx>) -> impl Future<Output = MiddlewareResult<Ctx>>`
/// closure already implements it.
pub trait Middleware<Ctx: Clone + Send + Sync + 'static>: Send + Sync + 'static {
    /// Process the request, then proceed or abort
    fn handle(
        &self,
        ctx: Context<Ctx>,
        req: Request,
        next: Next<Ctx>,
    ) -> BoxFuture<'static, MiddlewareResult<Ctx>>;
}

impl<Ctx, F, Fut> Middleware<Ctx> for F
where
    Ctx: Clone + Send + Sync + 'static,
    F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult<Ctx>> + Send + 'static,
{
    fn handle(
        &self,
        ctx: Context<Ctx>,
        req: Request,
        next: Next<Ctx>,
    ) -> BoxFuture<'static, MiddlewareResult<Ctx>> {
        Box::pin(self(ctx, req, next))
    }
}

/// Create middleware from an async function
///
/// # Example
/// ```rust,ignore
/// async fn logging(ctx: Context<AppContext>, req: Request, next: Next<AppContext>) -> MiddlewareResult<AppContext> {
///     tracing::info!(path = %req.path, "call");
///     Ok(next.proceed(ctx))
/// }
///
/// let logged = procedure().use_middleware_fn(from_fn(logging));
/// ```
pub fn from_fn<Ctx, F, Fut>(f: F) -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult<Ctx>> + Send + 'static,
{
    Arc::new(move |ctx, req, next| Box::pin(f(ctx, req, next)))
}

/// Erase a [`Middleware`] implementation into a [`MiddlewareFn`].
pub fn boxed<Ctx, M>(middleware: M) -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    M: Middleware<Ctx>,
{
    Arc::new(move |ctx, req, next| middleware.handle(ctx, req, next))
}
