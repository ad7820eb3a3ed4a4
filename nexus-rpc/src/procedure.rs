//! Procedure Builder API
//!
//! Provides a fluent builder for defining procedures with per-procedure
//! middleware, input validation and output validation.
//!
//! Every builder method borrows the receiver and returns a new builder, so a
//! partially configured builder can be kept around and used as the prefix of
//! several procedures:
//!
//! ```rust,ignore
//! use nexus_rpc::prelude::*;
//!
//! let authed = procedure::<AppContext>().use_middleware(require_user);
//!
//! let router = router([
//!     ("me", authed.query(|ctx, ()| async move { Ok(ctx.user.clone()) }).into()),
//!     ("delete", authed
//!         .input(Schema::<usize>::new())
//!         .mutation(|ctx, index| async move { ctx.posts.remove(index) })
//!         .into()),
//! ])?;
//! ```
//!
//! Finalizing with [`query`](ProcedureBuilder::query),
//! [`mutation`](ProcedureBuilder::mutation) or
//! [`subscription`](ProcedureBuilder::subscription) produces a [`Procedure`],
//! which has no builder methods left: nothing can be appended to a finished
//! definition and it cannot be finalized again.

use crate::middleware::{MiddlewareFn, MiddlewareResult, Next, ProcedureType, Request};
use crate::validation::ValidationError;
use crate::validator::Validator;
use crate::{Context, RpcError, RpcResult};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A parsed call, ready to run once the middleware chain has produced its
/// final context.
pub(crate) type Invocation<Ctx> =
    Box<dyn FnOnce(Context<Ctx>) -> BoxFuture<'static, RpcResult<Value>> + Send>;

/// Validates raw input and binds it to the resolver.
type Prepare<Ctx> = Arc<
    dyn Fn(Value) -> BoxFuture<'static, Result<Invocation<Ctx>, ValidationError>> + Send + Sync,
>;

/// Validates a serialized resolver result.
type OutputCheck =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ValidationError>> + Send + Sync>;

/// How a builder obtains the resolver's input.
enum InputSpec<In> {
    /// No validator: the resolver receives a fixed value and raw input is ignored.
    Absent(fn() -> In),
    /// Raw input goes through the validator.
    Parsed(Arc<dyn Validator<In>>),
}

impl<In> Clone for InputSpec<In> {
    fn clone(&self) -> Self {
        match self {
            Self::Absent(f) => Self::Absent(*f),
            Self::Parsed(v) => Self::Parsed(v.clone()),
        }
    }
}

/// Middleware appended to a builder, newest first.
///
/// Appending allocates one node and points it at the existing stack, so
/// builders extended from the same prefix share that prefix's nodes.
struct MiddlewareStack<Ctx: Clone + Send + Sync + 'static> {
    head: Option<Arc<StackNode<Ctx>>>,
    len: usize,
}

struct StackNode<Ctx: Clone + Send + Sync + 'static> {
    middleware: MiddlewareFn<Ctx>,
    prev: Option<Arc<StackNode<Ctx>>>,
}

impl<Ctx: Clone + Send + Sync + 'static> MiddlewareStack<Ctx> {
    fn new() -> Self {
        Self { head: None, len: 0 }
    }

    fn push(&self, middleware: MiddlewareFn<Ctx>) -> Self {
        Self {
            head: Some(Arc::new(StackNode {
                middleware,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// The stack in registration order.
    fn to_chain(&self) -> Arc<[MiddlewareFn<Ctx>]> {
        let mut chain = Vec::with_capacity(self.len);
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            chain.push(current.middleware.clone());
            node = current.prev.as_deref();
        }
        chain.reverse();
        chain.into()
    }
}

impl<Ctx: Clone + Send + Sync + 'static> Clone for MiddlewareStack<Ctx> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

/// Start building a procedure for context type `Ctx`.
pub fn procedure<Ctx>() -> ProcedureBuilder<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    ProcedureBuilder::new()
}

/// Builder for configuring individual procedures with middleware and
/// validation.
///
/// # Type Parameters
///
/// - `Ctx`: The context type passed to middleware and resolvers
/// - `In`: The validated input type (default: `()`, meaning no input validator)
pub struct ProcedureBuilder<Ctx, In = ()>
where
    Ctx: Clone + Send + Sync + 'static,
{
    /// Per-procedure middleware (executed in registration order).
    middleware: MiddlewareStack<Ctx>,
    input: InputSpec<In>,
    output: Option<OutputCheck>,
    description: Option<Arc<str>>,
}

impl<Ctx, In> Clone for ProcedureBuilder<Ctx, In>
where
    Ctx: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            middleware: self.middleware.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            description: self.description.clone(),
        }
    }
}

impl<Ctx> ProcedureBuilder<Ctx, ()>
where
    Ctx: Clone + Send + Sync + 'static,
{
    /// Creates an empty procedure builder.
    pub fn new() -> Self {
        Self {
            middleware: MiddlewareStack::new(),
            input: InputSpec::Absent(|| ()),
            output: None,
            description: None,
        }
    }

    /// Returns a builder whose resolver receives input parsed by `validator`.
    ///
    /// Input that the validator rejects fails the call with `BAD_REQUEST`
    /// before any middleware runs.
    #[must_use]
    pub fn input<In, V>(&self, validator: V) -> ProcedureBuilder<Ctx, In>
    where
        In: Send + 'static,
        V: Validator<In> + 'static,
    {
        ProcedureBuilder {
            middleware: self.middleware.clone(),
            input: InputSpec::Parsed(Arc::new(validator)),
            output: self.output.clone(),
            description: self.description.clone(),
        }
    }
}

impl<Ctx> Default for ProcedureBuilder<Ctx, ()>
where
    Ctx: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx, In> ProcedureBuilder<Ctx, In>
where
    Ctx: Clone + Send + Sync + 'static,
    In: Send + 'static,
{
    /// Returns a builder with `middleware` appended.
    ///
    /// Middleware is executed in registration order.
    ///
    /// ```rust,ignore
    /// let procedure = procedure::<AppContext>()
    ///     .use_middleware(logging)      // Executes first
    ///     .use_middleware(auth)         // Executes second
    ///     .query(get_user);
    /// ```
    #[must_use]
    pub fn use_middleware<F, Fut>(&self, middleware: F) -> Self
    where
        F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MiddlewareResult<Ctx>> + Send + 'static,
    {
        self.use_middleware_fn(Arc::new(move |ctx, req, next| {
            Box::pin(middleware(ctx, req, next))
        }))
    }

    /// Returns a builder with an already wrapped middleware appended.
    #[must_use]
    pub fn use_middleware_fn(&self, middleware: MiddlewareFn<Ctx>) -> Self {
        let mut next = self.clone();
        next.middleware = self.middleware.push(middleware);
        next
    }

    /// Returns a builder that checks the resolver's result with `validator`.
    ///
    /// The result is serialized, parsed as `T` and serialized again, so the
    /// caller sees the validator's view of it. A rejection is an `INTERNAL`
    /// error. Setting an output validator again replaces the previous one.
    #[must_use]
    pub fn output<T, V>(&self, validator: V) -> Self
    where
        T: Serialize + Send + 'static,
        V: Validator<T> + 'static,
    {
        let validator = Arc::new(validator);
        let check: OutputCheck = Arc::new(move |value| {
            let validator = validator.clone();
            Box::pin(async move {
                let parsed: T = Validator::<T>::parse(&*validator, value).await?;
                Ok::<_, ValidationError>(serde_json::to_value(parsed)?)
            })
        });

        let mut next = self.clone();
        next.output = Some(check);
        next
    }

    /// Returns a builder carrying a human-readable description.
    #[must_use]
    pub fn meta(&self, description: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.description = Some(Arc::from(description.into()));
        next
    }

    /// Number of middleware appended so far.
    pub fn middleware_len(&self) -> usize {
        self.middleware.len
    }

    /// Finalize as a query (read-only operation).
    ///
    /// ```rust,ignore
    /// async fn get_user(ctx: Context<AppContext>, input: GetUserInput) -> RpcResult<User> {
    ///     // ...
    /// }
    ///
    /// let get = procedure::<AppContext>()
    ///     .input(Schema::<GetUserInput>::validated())
    ///     .query(get_user);
    /// ```
    pub fn query<H, Fut, Out>(&self, handler: H) -> Procedure<Ctx>
    where
        H: Fn(Context<Ctx>, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Out>> + Send + 'static,
        Out: Serialize + Send + 'static,
    {
        self.build_procedure(ProcedureType::Query, handler)
    }

    /// Finalize as a mutation (write operation).
    pub fn mutation<H, Fut, Out>(&self, handler: H) -> Procedure<Ctx>
    where
        H: Fn(Context<Ctx>, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Out>> + Send + 'static,
        Out: Serialize + Send + 'static,
    {
        self.build_procedure(ProcedureType::Mutation, handler)
    }

    /// Finalize as a subscription.
    ///
    /// Each call runs the handler once and returns its result.
    pub fn subscription<H, Fut, Out>(&self, handler: H) -> Procedure<Ctx>
    where
        H: Fn(Context<Ctx>, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Out>> + Send + 'static,
        Out: Serialize + Send + 'static,
    {
        self.build_procedure(ProcedureType::Subscription, handler)
    }

    fn build_procedure<H, Fut, Out>(&self, kind: ProcedureType, handler: H) -> Procedure<Ctx>
    where
        H: Fn(Context<Ctx>, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Out>> + Send + 'static,
        Out: Serialize + Send + 'static,
    {
        let handler = Arc::new(handler);
        let input = self.input.clone();
        let has_input = matches!(input, InputSpec::Parsed(_));

        let prepare: Prepare<Ctx> = Arc::new(move |raw| {
            let handler = handler.clone();
            let input = input.clone();
            Box::pin(async move {
                let value = match input {
                    InputSpec::Absent(default) => default(),
                    InputSpec::Parsed(validator) => validator.parse(raw).await?,
                };
                let invocation: Invocation<Ctx> = Box::new(move |ctx| {
                    Box::pin(async move {
                        let output = handler(ctx, value).await?;
                        Ok::<_, RpcError>(serde_json::to_value(output)?)
                    })
                });
                Ok::<_, ValidationError>(invocation)
            })
        });

        Procedure {
            inner: Arc::new(ProcedureDef {
                kind,
                middleware: self.middleware.to_chain(),
                prepare,
                output: self.output.clone(),
                has_input,
                description: self.description.clone(),
            }),
        }
    }
}

struct ProcedureDef<Ctx: Clone + Send + Sync + 'static> {
    kind: ProcedureType,
    middleware: Arc<[MiddlewareFn<Ctx>]>,
    prepare: Prepare<Ctx>,
    output: Option<OutputCheck>,
    has_input: bool,
    description: Option<Arc<str>>,
}

/// A finished, immutable procedure definition.
///
/// Cheap to clone; clones share the same definition.
pub struct Procedure<Ctx: Clone + Send + Sync + 'static> {
    inner: Arc<ProcedureDef<Ctx>>,
}

impl<Ctx: Clone + Send + Sync + 'static> Procedure<Ctx> {
    /// The kind this procedure was finalized as.
    pub fn kind(&self) -> ProcedureType {
        self.inner.kind
    }

    /// Whether an input validator is attached.
    pub fn has_input(&self) -> bool {
        self.inner.has_input
    }

    /// Whether an output validator is attached.
    pub fn has_output(&self) -> bool {
        self.inner.output.is_some()
    }

    /// Number of middleware in the chain.
    pub fn middleware_len(&self) -> usize {
        self.inner.middleware.len()
    }

    /// Description set with [`ProcedureBuilder::meta`].
    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    /// Returns true if both handles refer to the same definition.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn middleware(&self) -> &[MiddlewareFn<Ctx>] {
        &self.inner.middleware
    }

    pub(crate) fn prepare(
        &self,
        raw: Value,
    ) -> BoxFuture<'static, Result<Invocation<Ctx>, ValidationError>> {
        (self.inner.prepare)(raw)
    }

    /// Runs the output validator, or passes `value` through when there is none.
    pub(crate) fn check_output(
        &self,
        value: Value,
    ) -> BoxFuture<'static, Result<Value, ValidationError>> {
        match &self.inner.output {
            Some(check) => check(value),
            None => Box::pin(futures::future::ready(Ok(value))),
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> Clone for Procedure<Ctx> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> fmt::Debug for Procedure<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("kind", &self.inner.kind)
            .field("middleware", &self.inner.middleware.len())
            .field("has_input", &self.inner.has_input)
            .field("has_output", &self.inner.output.is_some())
            .field("description", &self.inner.description)
            .finish()
    }
}
