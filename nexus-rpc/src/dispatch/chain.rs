//! Middleware chain execution
//!
//! The chain is a left fold: each step gets the context produced by the step
//! before it and must hand back a [`Proceed`](crate::middleware::Proceed)
//! minted from its own [`Next`]. The resolver only runs once the fold
//! finishes.

use super::cancel::{self, CancellationSignal};
use crate::middleware::{MiddlewareFn, Next, Request};
use crate::{Context, RpcResult};

/// Run `middleware` in order starting from `ctx`, returning the final context.
///
/// Stops at the first step that aborts and returns its error unchanged.
pub(crate) async fn run<Ctx: Clone + Send + Sync + 'static>(
    middleware: &[MiddlewareFn<Ctx>],
    ctx: Context<Ctx>,
    request: &Request,
    signal: Option<&CancellationSignal>,
) -> RpcResult<Context<Ctx>> {
    let mut ctx = ctx;

    for (step, mw) in middleware.iter().enumerate() {
        cancel::check(signal, request, "middleware")?;

        tracing::trace!(
            call_id = %request.call_id,
            path = %request.path,
            step = step,
            "Running middleware"
        );

        let proceed = mw(ctx, request.clone(), Next::new(request.call_id, step))
            .await
            .inspect_err(|err| {
                tracing::debug!(
                    call_id = %request.call_id,
                    path = %request.path,
                    step = step,
                    code = %err.code,
                    "Middleware aborted call"
                );
            })?;
        ctx = proceed.into_context(request.call_id, step)?;
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{CallId, ProcedureType};
    use crate::{RpcError, RpcErrorCode};
    use futures::FutureExt;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, Default)]
    struct Trail {
        steps: Vec<usize>,
    }

    fn request() -> Request {
        Request {
            call_id: CallId::new(),
            path: "trail".into(),
            procedure_type: ProcedureType::Query,
            input: serde_json::Value::Null,
        }
    }

    fn appender(n: usize) -> MiddlewareFn<Trail> {
        Arc::new(move |ctx: Context<Trail>, _req, next: Next<Trail>| {
            Box::pin(async move {
                let ctx = ctx.derive(|t| {
                    let mut t = t.clone();
                    t.steps.push(n);
                    t
                });
                Ok(next.proceed(ctx))
            })
        })
    }

    #[test]
    fn steps_thread_context_in_order() {
        let chain: Vec<_> = (0..4).map(appender).collect();
        let out = run(&chain, Context::new(Trail::default()), &request(), None)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(out.steps, [0, 1, 2, 3]);
    }

    #[test]
    fn abort_skips_the_rest() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = |n: usize, fail: bool| -> MiddlewareFn<Trail> {
            let seen = seen.clone();
            Arc::new(move |ctx, _req, next: Next<Trail>| {
                seen.lock().unwrap().push(n);
                Box::pin(async move {
                    if fail {
                        Err(RpcError::forbidden("stop"))
                    } else {
                        Ok(next.proceed(ctx))
                    }
                })
            })
        };

        let chain = vec![record(0, false), record(1, true), record(2, false)];
        let err = run(&chain, Context::new(Trail::default()), &request(), None)
            .now_or_never()
            .unwrap()
            .unwrap_err();

        assert_eq!(err.code, RpcErrorCode::Forbidden);
        assert_eq!(*seen.lock().unwrap(), [0, 1]);
    }

    #[test]
    fn cancelled_signal_stops_before_first_step() {
        let signal = CancellationSignal::new();
        signal.cancel();
        let chain = vec![appender(0)];
        let err = run(&chain, Context::new(Trail::default()), &request(), Some(&signal))
            .now_or_never()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code, RpcErrorCode::Cancelled);
    }
}
