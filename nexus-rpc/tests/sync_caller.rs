//! Integration tests for the synchronous caller

use nexus_rpc::prelude::*;
use nexus_rpc::validator;
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

#[derive(Clone, Default)]
struct AppContext {
    foo: Option<String>,
    posts: Arc<Mutex<Vec<String>>>,
}

/// Returns `Pending` on the first poll and completes on the second.
#[derive(Default)]
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

fn app_router() -> Router<AppContext> {
    let authed = procedure::<AppContext>().use_middleware(|ctx, _req, next| async move {
        if ctx.foo.is_none() {
            return Err(RpcError::unauthorized("You are not authorized"));
        }
        Ok(next.proceed(ctx))
    });

    let post = router([(
        "delete",
        procedure::<AppContext>()
            .input(Schema::<usize>::new())
            .mutation(|ctx: Context<AppContext>, index: usize| async move {
                let mut posts = ctx.posts.lock().unwrap();
                if index >= posts.len() {
                    return Err(RpcError::not_found(format!("No post at {}", index)));
                }
                posts.remove(index);
                Ok(())
            })
            .into(),
    )])
    .unwrap();

    router([
        (
            "hello",
            procedure::<AppContext>()
                .query(|_ctx, ()| async { Ok("world") })
                .into(),
        ),
        (
            "foo",
            authed
                .query(|ctx: Context<AppContext>, ()| async move { Ok(ctx.foo.clone()) })
                .into(),
        ),
        ("post", post.into()),
    ])
    .unwrap()
}

fn seeded() -> AppContext {
    AppContext {
        foo: None,
        posts: Arc::new(Mutex::new(vec!["One".into(), "Two".into(), "Three".into()])),
    }
}

#[test]
fn query_returns_resolver_value() {
    let caller = app_router().create_sync_caller(AppContext::default());
    assert_eq!(caller.procedure("hello").unwrap().call().unwrap(), json!("world"));
}

#[test]
fn nested_mutation_changes_shared_state() {
    let ctx = seeded();
    let posts = ctx.posts.clone();
    let caller = app_router().create_sync_caller(ctx);

    let result = caller.router("post").unwrap().procedure("delete").unwrap().call_with(0);
    assert_eq!(result.unwrap(), Value::Null);
    assert_eq!(*posts.lock().unwrap(), ["Two", "Three"]);

    let err = caller.at("post.delete").unwrap().call_with(9).unwrap_err();
    assert_eq!(err.code, RpcErrorCode::NotFound);
    assert_eq!(*posts.lock().unwrap(), ["Two", "Three"]);
}

#[test]
fn middleware_aborts_without_credentials() {
    let caller = app_router().create_sync_caller(AppContext::default());
    let err = caller.procedure("foo").unwrap().call().unwrap_err();
    assert_eq!(err.code, RpcErrorCode::Unauthorized);
    assert_eq!(err.message, "You are not authorized");

    let caller = app_router().create_sync_caller(AppContext {
        foo: Some("bar".into()),
        ..AppContext::default()
    });
    assert_eq!(caller.procedure("foo").unwrap().call().unwrap(), json!("bar"));
}

#[test]
fn rejected_input_is_bad_request() {
    let caller = app_router().create_sync_caller(seeded());
    let err = caller.at("post.delete").unwrap().call_with("first").unwrap_err();
    assert_eq!(err.code, RpcErrorCode::BadRequest);
    assert!(err.message.starts_with("Invalid input"), "{}", err.message);
}

#[test]
fn unknown_paths_are_not_found() {
    let caller = app_router().create_sync_caller(AppContext::default());
    assert_eq!(caller.at("post.create").unwrap_err().code, RpcErrorCode::NotFound);
    assert_eq!(caller.procedure("goodbye").unwrap_err().code, RpcErrorCode::NotFound);
}

#[test]
fn subscription_runs_handler_once_per_call() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counted = runs.clone();
    let app = router([(
        "ticks",
        procedure::<EmptyContext>()
            .subscription(move |_ctx, ()| {
                let n = counted.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(n) }
            })
            .into(),
    )])
    .unwrap();

    let caller = app.create_sync_caller(EmptyContext);
    let ticks = caller.procedure("ticks").unwrap();
    assert_eq!(ticks.kind(), ProcedureType::Subscription);
    assert_eq!(ticks.call().unwrap(), json!(1));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn suspending_middleware_is_async_not_supported() {
    let resolved = Arc::new(AtomicUsize::new(0));
    let hits = resolved.clone();
    let app = router([(
        "slow",
        procedure::<EmptyContext>()
            .use_middleware(|ctx, _req, next| async move {
                YieldOnce::default().await;
                Ok(next.proceed(ctx))
            })
            .query(move |_ctx, ()| {
                hits.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .into(),
    )])
    .unwrap();

    let err = app.create_sync_caller(EmptyContext).procedure("slow").unwrap().call().unwrap_err();
    assert_eq!(err.code, RpcErrorCode::AsyncNotSupported);
    assert_eq!(resolved.load(Ordering::SeqCst), 0, "abandoned calls never resume");
}

#[test]
fn suspending_resolver_is_async_not_supported() {
    let app = router([(
        "slow",
        procedure::<EmptyContext>()
            .query(|_ctx, ()| async {
                YieldOnce::default().await;
                Ok("late")
            })
            .into(),
    )])
    .unwrap();

    let err = app.create_sync_caller(EmptyContext).procedure("slow").unwrap().call().unwrap_err();
    assert_eq!(err.code, RpcErrorCode::AsyncNotSupported);
    assert!(err.message.contains("'slow'"));
}

#[test]
fn suspending_input_validator_is_async_not_supported() {
    let app = router([(
        "check",
        procedure::<EmptyContext>()
            .input(validator::from_async_fn(|raw: Value| async move {
                YieldOnce::default().await;
                serde_json::from_value::<u32>(raw)
            }))
            .query(|_ctx, n: u32| async move { Ok(n) })
            .into(),
    )])
    .unwrap();

    let err = app
        .create_sync_caller(EmptyContext)
        .procedure("check")
        .unwrap()
        .call_with(3)
        .unwrap_err();
    assert_eq!(err.code, RpcErrorCode::AsyncNotSupported);
}

#[test]
fn ready_async_validator_settles_in_place() {
    let app = router([(
        "check",
        procedure::<EmptyContext>()
            .input(validator::from_async_fn(|raw: Value| async move {
                serde_json::from_value::<u32>(raw)
            }))
            .query(|_ctx, n: u32| async move { Ok(n * 2) })
            .into(),
    )])
    .unwrap();

    let caller = app.create_sync_caller(EmptyContext);
    assert_eq!(caller.procedure("check").unwrap().call_with(21).unwrap(), json!(42));
}

#[test]
fn call_without_input_equals_call_with_null() {
    let caller = app_router().create_sync_caller(AppContext::default());
    let hello = caller.procedure("hello").unwrap();
    assert_eq!(hello.call().unwrap(), hello.call_with(Value::Null).unwrap());
    assert!(!hello.has_input());
}

#[test]
fn context_factory_runs_once_per_call() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let factory = ContextFactory::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        AppContext {
            foo: Some("fresh".into()),
            ..AppContext::default()
        }
    });

    let caller = app_router().create_sync_caller(factory);
    let foo = caller.procedure("foo").unwrap();
    for _ in 0..3 {
        assert_eq!(foo.call().unwrap(), json!("fresh"));
    }
    assert_eq!(built.load(Ordering::SeqCst), 3);
}

#[test]
fn oversized_input_is_rejected_before_validation() {
    let caller = app_router()
        .create_sync_caller_with_config(seeded(), RpcConfig::new().with_max_input_size(8))
        .unwrap();
    let err = caller.at("post.delete").unwrap().call_with("a very long input").unwrap_err();
    assert_eq!(err.code, RpcErrorCode::PayloadTooLarge);
}

#[test]
fn invalid_config_is_refused() {
    let result = app_router()
        .create_sync_caller_with_config(AppContext::default(), RpcConfig::new().with_max_input_size(0));
    assert!(result.is_err());
}

#[test]
fn typed_handles_check_arguments_at_compile_time() {
    let ctx = seeded();
    let posts = ctx.posts.clone();
    let caller = app_router().create_sync_caller(ctx);

    let hello = caller.procedure("hello").unwrap().typed::<(), String>();
    assert_eq!(hello.call().unwrap(), "world");

    let delete = caller.at("post.delete").unwrap().typed::<usize, ()>();
    delete.call_with(1).unwrap();
    assert_eq!(*posts.lock().unwrap(), ["One", "Three"]);

    let wrong = caller.procedure("hello").unwrap().typed::<(), Vec<u8>>();
    assert_eq!(wrong.call().unwrap_err().code, RpcErrorCode::Internal);
}
