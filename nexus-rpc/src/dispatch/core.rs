//! The dispatcher

use super::cancel::{self, CancellationSignal};
use super::chain;
use crate::config::{ConfigValidationError, RpcConfig};
use crate::error::PanicError;
use crate::middleware::{CallId, ProcedureType, Request};
use crate::procedure::Procedure;
use crate::validation::{ValidationError, validate_input_size};
use crate::{Context, EmptyContext, RpcError, RpcResult, Router};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Runs calls against a router.
///
/// Cheap to clone. A dispatcher keeps no per-call state, so one instance can
/// serve any number of concurrent calls.
///
/// ```rust,ignore
/// let dispatcher = Dispatcher::new(app_router());
/// let out = dispatcher
///     .dispatch("post.delete", ProcedureType::Mutation, json!(0), Context::new(ctx))
///     .await?;
/// ```
pub struct Dispatcher<Ctx: Clone + Send + Sync + 'static = EmptyContext> {
    router: Router<Ctx>,
    config: Arc<RpcConfig>,
}

impl<Ctx: Clone + Send + Sync + 'static> Dispatcher<Ctx> {
    /// Create a dispatcher with the default configuration.
    pub fn new(router: Router<Ctx>) -> Self {
        Self {
            router,
            config: Arc::new(RpcConfig::default()),
        }
    }

    /// Create a dispatcher with a custom configuration.
    pub fn with_config(router: Router<Ctx>, config: RpcConfig) -> Result<Self, ConfigValidationError> {
        config.validate()?;
        Ok(Self {
            router,
            config: Arc::new(config),
        })
    }

    /// The router calls are resolved against.
    pub fn router(&self) -> &Router<Ctx> {
        &self.router
    }

    /// The active configuration.
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Dispatch one call.
    pub async fn dispatch(
        &self,
        path: &str,
        kind: ProcedureType,
        input: Value,
        ctx: Context<Ctx>,
    ) -> RpcResult<Value> {
        self.dispatch_with_signal(path, kind, input, ctx, None).await
    }

    /// Dispatch one call, giving up with `CANCELLED` at the first step
    /// boundary after `signal` fires.
    pub async fn dispatch_with_signal(
        &self,
        path: &str,
        kind: ProcedureType,
        input: Value,
        ctx: Context<Ctx>,
        signal: Option<&CancellationSignal>,
    ) -> RpcResult<Value> {
        let request = Request {
            call_id: CallId::new(),
            path: path.to_string(),
            procedure_type: kind,
            input,
        };
        let started = Instant::now();

        let result = self.run(&request, ctx, signal).await;

        let elapsed_us = started.elapsed().as_micros() as u64;
        match &result {
            Ok(_) if self.config.debug_logging => tracing::debug!(
                call_id = %request.call_id,
                path = %request.path,
                procedure_type = %kind,
                elapsed_us = elapsed_us,
                "Call completed"
            ),
            Ok(_) => tracing::trace!(
                call_id = %request.call_id,
                path = %request.path,
                procedure_type = %kind,
                elapsed_us = elapsed_us,
                "Call completed"
            ),
            Err(err) if self.config.debug_logging => tracing::debug!(
                call_id = %request.call_id,
                path = %request.path,
                procedure_type = %kind,
                elapsed_us = elapsed_us,
                code = %err.code,
                "Call failed"
            ),
            Err(err) => tracing::trace!(
                call_id = %request.call_id,
                path = %request.path,
                procedure_type = %kind,
                elapsed_us = elapsed_us,
                code = %err.code,
                "Call failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        request: &Request,
        ctx: Context<Ctx>,
        signal: Option<&CancellationSignal>,
    ) -> RpcResult<Value> {
        let procedure = self.router.resolve(&request.path)?;

        if procedure.kind() != request.procedure_type {
            tracing::debug!(
                call_id = %request.call_id,
                path = %request.path,
                requested = %request.procedure_type,
                registered = %procedure.kind(),
                "Procedure kind mismatch"
            );
            return Err(RpcError::bad_request(format!(
                "Procedure '{}' is a {}, not a {}",
                request.path,
                procedure.kind(),
                request.procedure_type
            )));
        }

        validate_input_size(&request.input, self.config.max_input_size)?;

        AssertUnwindSafe(execute(procedure, request, ctx, signal))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let panic = PanicError::from_payload(payload);
                tracing::warn!(
                    call_id = %request.call_id,
                    path = %request.path,
                    panic = %panic.message(),
                    "Procedure panicked"
                );
                Err(RpcError::internal(format!("Procedure '{}' panicked", request.path))
                    .with_cause(panic))
            })
    }
}

impl<Ctx: Clone + Send + Sync + 'static> Clone for Dispatcher<Ctx> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            config: self.config.clone(),
        }
    }
}

/// Input, middleware, resolver and output, in that order.
async fn execute<Ctx: Clone + Send + Sync + 'static>(
    procedure: &Procedure<Ctx>,
    request: &Request,
    ctx: Context<Ctx>,
    signal: Option<&CancellationSignal>,
) -> RpcResult<Value> {
    cancel::check(signal, request, "input")?;
    let invocation = procedure
        .prepare(request.input.clone())
        .await
        .map_err(|err| {
            tracing::debug!(
                call_id = %request.call_id,
                path = %request.path,
                error = %err,
                "Input rejected"
            );
            rejected(RpcError::bad_request(format!("Invalid input: {}", err)), err)
        })?;

    let ctx = chain::run(procedure.middleware(), ctx, request, signal).await?;

    cancel::check(signal, request, "resolver")?;
    let output = invocation(ctx).await?;

    cancel::check(signal, request, "output")?;
    procedure.check_output(output).await.map_err(|err| {
        tracing::warn!(
            call_id = %request.call_id,
            path = %request.path,
            error = %err,
            "Output rejected"
        );
        rejected(RpcError::internal(format!("Invalid output: {}", err)), err)
    })
}

fn rejected(error: RpcError, cause: ValidationError) -> RpcError {
    let error = if cause.errors.is_empty() {
        error
    } else {
        error.with_details(serde_json::json!({ "errors": cause.errors }))
    };
    error.with_cause(cause)
}

/// Dispatch one call against `router` with the default configuration.
pub async fn dispatch<Ctx: Clone + Send + Sync + 'static>(
    router: &Router<Ctx>,
    path: &str,
    kind: ProcedureType,
    input: Value,
    ctx: Context<Ctx>,
) -> RpcResult<Value> {
    Dispatcher::new(router.clone())
        .dispatch(path, kind, input, ctx)
        .await
}
