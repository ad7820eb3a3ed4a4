//! Middleware tests - Property-based tests for middleware chain execution
//!
//! Tests that middleware steps run in registration order exactly once, that
//! an abort skips everything downstream, and that each step sees the context
//! produced by the step before it.

use proptest::prelude::*;
use std::sync::{Arc, Mutex};

use crate::{
    Context, MiddlewareResult, Next, ProcedureType, Request, RpcError, RpcErrorCode, Router,
    dispatch, procedure::ProcedureBuilder, router,
};

// =============================================================================
// Test Helpers
// =============================================================================

/// A context recording which steps produced it
#[derive(Clone, Default)]
struct TestContext {
    /// Shared log of everything that ran, across all contexts of a call
    execution_log: Arc<Mutex<Vec<String>>>,
    /// Names of the steps that derived this context, in order
    lineage: Vec<String>,
}

impl TestContext {
    fn log(&self, entry: impl Into<String>) {
        self.execution_log.lock().unwrap().push(entry.into());
    }
}

/// Create a middleware that logs itself and extends the context's lineage
fn create_logging_middleware(
    name: String,
) -> impl Fn(Context<TestContext>, Request, Next<TestContext>) -> futures::future::Ready<MiddlewareResult<TestContext>>
+ Send
+ Sync
+ 'static {
    move |ctx: Context<TestContext>, _req: Request, next: Next<TestContext>| {
        ctx.log(&name);
        let derived = ctx.derive(|c| {
            let mut c = c.clone();
            c.lineage.push(name.clone());
            c
        });
        futures::future::ready(Ok(next.proceed(derived)))
    }
}

/// Create a middleware that logs itself and aborts the call
fn create_abort_middleware(
    name: String,
) -> impl Fn(Context<TestContext>, Request, Next<TestContext>) -> futures::future::Ready<MiddlewareResult<TestContext>>
+ Send
+ Sync
+ 'static {
    move |ctx: Context<TestContext>, _req: Request, _next: Next<TestContext>| {
        ctx.log(format!("{}_abort", name));
        futures::future::ready(Err(RpcError::unauthorized(format!("{} said no", name))))
    }
}

/// Build a router with one query behind `builder`, whose resolver logs and
/// returns the lineage it was handed
fn router_with(builder: ProcedureBuilder<TestContext>) -> Router<TestContext> {
    router([(
        "test",
        builder
            .query(|ctx: Context<TestContext>, ()| async move {
                ctx.log("handler");
                Ok(ctx.lineage.clone())
            })
            .into(),
    )])
    .unwrap()
}

// =============================================================================
// Property-Based Tests
// =============================================================================

proptest! {
    /// For a chain of N middleware, every step runs once, in declared order,
    /// before the resolver.
    #[test]
    fn prop_middleware_execution_order(middleware_count in 0usize..8) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let test_ctx = TestContext::default();

            let mut builder = crate::procedure::<TestContext>();
            for i in 0..middleware_count {
                builder = builder.use_middleware(create_logging_middleware(format!("M{}", i + 1)));
            }
            let router = router_with(builder);

            let result = dispatch(
                &router,
                "test",
                ProcedureType::Query,
                serde_json::Value::Null,
                Context::new(test_ctx.clone()),
            )
            .await;
            prop_assert!(result.is_ok(), "Call should succeed");

            let mut expected: Vec<String> =
                (0..middleware_count).map(|i| format!("M{}", i + 1)).collect();
            let lineage = serde_json::json!(expected.clone());
            expected.push("handler".to_string());

            let log = test_ctx.execution_log.lock().unwrap().clone();
            prop_assert_eq!(log, expected, "Middleware should run in order, once each");
            prop_assert_eq!(result.unwrap(), lineage, "Resolver sees the final context");

            Ok(())
        })?;
    }

    /// An abort at step K skips steps K+1..N and the resolver, and its error
    /// becomes the call's error.
    #[test]
    fn prop_middleware_abort_skips_downstream(
        abort_position in 0usize..5,
        total_middleware in 1usize..6,
    ) {
        let abort_position = abort_position % total_middleware;

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let test_ctx = TestContext::default();

            let mut builder = crate::procedure::<TestContext>();
            for i in 0..total_middleware {
                let name = format!("M{}", i + 1);
                builder = if i == abort_position {
                    builder.use_middleware(create_abort_middleware(name))
                } else {
                    builder.use_middleware(create_logging_middleware(name))
                };
            }
            let router = router_with(builder);

            let err = dispatch(
                &router,
                "test",
                ProcedureType::Query,
                serde_json::Value::Null,
                Context::new(test_ctx.clone()),
            )
            .await
            .unwrap_err();

            prop_assert_eq!(err.code, RpcErrorCode::Unauthorized);
            prop_assert_eq!(err.message, format!("M{} said no", abort_position + 1));

            let mut expected: Vec<String> =
                (0..abort_position).map(|i| format!("M{}", i + 1)).collect();
            expected.push(format!("M{}_abort", abort_position + 1));

            let log = test_ctx.execution_log.lock().unwrap().clone();
            prop_assert_eq!(log, expected, "Nothing after the abort may run");

            Ok(())
        })?;
    }

    /// Concurrent calls through the same router never see each other's
    /// derived contexts.
    #[test]
    fn prop_concurrent_calls_do_not_share_context(calls in 2usize..6) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let builder = crate::procedure::<TestContext>()
                .use_middleware(create_logging_middleware("auth".into()))
                .use_middleware(|ctx: Context<TestContext>, _req, next: Next<TestContext>| async move {
                    tokio::task::yield_now().await;
                    Ok(next.proceed(ctx))
                });
            let router = router_with(builder);

            let results = futures::future::join_all((0..calls).map(|_| {
                dispatch(
                    &router,
                    "test",
                    ProcedureType::Query,
                    serde_json::Value::Null,
                    Context::new(TestContext::default()),
                )
            }))
            .await;

            for result in results {
                prop_assert_eq!(result.unwrap(), serde_json::json!(["auth"]));
            }
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn proceeding_with_another_calls_token_is_internal() {
    let builder = crate::procedure::<TestContext>()
        .use_middleware(|ctx: Context<TestContext>, _req, _next: Next<TestContext>| async move {
            let foreign = Next::new(crate::CallId::new(), 0);
            Ok(foreign.proceed(ctx))
        })
        .use_middleware(create_logging_middleware("never".into()));

    let test_ctx = TestContext::default();
    let router = router_with(builder);
    let err = dispatch(
        &router,
        "test",
        ProcedureType::Query,
        serde_json::Value::Null,
        Context::new(test_ctx.clone()),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code, RpcErrorCode::Internal);
    assert!(test_ctx.execution_log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stolen_token_from_previous_step_is_internal() {
    let stash: Arc<Mutex<Option<Next<TestContext>>>> = Arc::default();
    let stash_in = stash.clone();
    let stash_out = stash.clone();

    let builder = crate::procedure::<TestContext>()
        .use_middleware(move |ctx: Context<TestContext>, req: Request, next: Next<TestContext>| {
            let stash = stash_in.clone();
            async move {
                // Hand a same-call, same-step token to the next step and proceed with it.
                stash
                    .lock()
                    .unwrap()
                    .replace(Next::new(req.call_id, next.step()));
                Ok(next.proceed(ctx))
            }
        })
        .use_middleware(move |ctx: Context<TestContext>, _req, _next: Next<TestContext>| {
            let stash = stash_out.clone();
            async move {
                let stolen = stash.lock().unwrap().take().expect("token stashed");
                Ok(stolen.proceed(ctx))
            }
        });

    let router = router_with(builder);
    let err = dispatch(
        &router,
        "test",
        ProcedureType::Query,
        serde_json::Value::Null,
        Context::new(TestContext::default()),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code, RpcErrorCode::Internal);
    assert!(err.message.contains("step 1"));
}
