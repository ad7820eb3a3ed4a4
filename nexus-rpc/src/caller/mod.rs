//! In-process callers
//!
//! A caller wraps a [`Router`] and a base context and exposes the router's
//! procedures as a tree of callable leaves, with no transport in between.
//!
//! ```rust,ignore
//! let caller = app_router().create_sync_caller(AppContext::default());
//!
//! let greeting = caller.procedure("hello")?.call()?;
//! caller.at("post.delete")?.call_with(0)?;
//! ```
//!
//! The [`SyncCaller`] returns results directly and fails with
//! `ASYNC_NOT_SUPPORTED` when a call would have to wait. The [`AsyncCaller`]
//! returns futures and accepts a cancellation signal per call. Either kind of
//! leaf can be viewed through `typed::<In, Out>()` for compile-time checked
//! arguments and deserialized results.

mod async_caller;
mod sync_caller;
mod tree;
mod typed;

pub use async_caller::{AsyncCaller, AsyncProcedure};
pub use sync_caller::{SyncCaller, SyncProcedure};
pub use tree::{CallerNode, CallerTree};
pub use typed::{TypedAsyncProcedure, TypedSyncProcedure};

use crate::config::{ConfigValidationError, RpcConfig};
use crate::context::ContextFactory;
use crate::dispatch::Dispatcher;
use crate::middleware::ProcedureType;
use crate::router::RouterNode;
use crate::{RpcError, RpcResult, Router};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// State shared by every leaf of one caller.
struct Shared<Ctx: Clone + Send + Sync + 'static> {
    dispatcher: Dispatcher<Ctx>,
    context: ContextFactory<Ctx>,
}

/// What a leaf needs to dispatch its procedure.
struct Endpoint<Ctx: Clone + Send + Sync + 'static> {
    path: String,
    kind: ProcedureType,
    has_input: bool,
    shared: Arc<Shared<Ctx>>,
}

impl<Ctx: Clone + Send + Sync + 'static> Endpoint<Ctx> {
    fn encode<I: Serialize>(&self, input: I) -> RpcResult<Value> {
        serde_json::to_value(input).map_err(|err| {
            RpcError::bad_request(format!("Input for '{}' is not representable: {}", self.path, err))
                .with_cause(err)
        })
    }

    fn finish(&self, result: RpcResult<Value>) -> RpcResult<Value> {
        if self.shared.dispatcher.config().sanitize_errors {
            result.map_err(RpcError::sanitize)
        } else {
            result
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> fmt::Debug for Endpoint<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("has_input", &self.has_input)
            .finish()
    }
}

fn build_tree<Ctx, L>(
    router: &Router<Ctx>,
    prefix: Option<&str>,
    shared: &Arc<Shared<Ctx>>,
    leaf: fn(Endpoint<Ctx>) -> L,
) -> CallerTree<L>
where
    Ctx: Clone + Send + Sync + 'static,
{
    let children = router
        .children()
        .map(|(name, node)| {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name.to_string(),
            };
            let entry = match node {
                RouterNode::Procedure(procedure) => CallerNode::Procedure(leaf(Endpoint {
                    kind: procedure.kind(),
                    has_input: procedure.has_input(),
                    shared: shared.clone(),
                    path,
                })),
                RouterNode::Router(nested) => {
                    CallerNode::Router(build_tree(nested, Some(&path), shared, leaf))
                }
            };
            (name.to_string(), entry)
        })
        .collect::<BTreeMap<_, _>>();

    CallerTree::new(children)
}

fn make_caller<Ctx, L>(
    router: &Router<Ctx>,
    dispatcher: Dispatcher<Ctx>,
    context: ContextFactory<Ctx>,
    leaf: fn(Endpoint<Ctx>) -> L,
) -> CallerTree<L>
where
    Ctx: Clone + Send + Sync + 'static,
{
    let shared = Arc::new(Shared {
        dispatcher,
        context,
    });
    tracing::debug!(procedures = router.len(), "Caller created");
    build_tree(router, None, &shared, leaf)
}

impl<Ctx: Clone + Send + Sync + 'static> Router<Ctx> {
    /// Create a synchronous caller with the default configuration.
    ///
    /// `context` is either a context value shared by every call or a
    /// [`ContextFactory`] that builds one per call.
    pub fn create_sync_caller(&self, context: impl Into<ContextFactory<Ctx>>) -> SyncCaller<Ctx> {
        make_caller(
            self,
            Dispatcher::new(self.clone()),
            context.into(),
            SyncProcedure::from_endpoint,
        )
    }

    /// Create a synchronous caller with a custom configuration.
    pub fn create_sync_caller_with_config(
        &self,
        context: impl Into<ContextFactory<Ctx>>,
        config: RpcConfig,
    ) -> Result<SyncCaller<Ctx>, ConfigValidationError> {
        let dispatcher = Dispatcher::with_config(self.clone(), config)?;
        Ok(make_caller(
            self,
            dispatcher,
            context.into(),
            SyncProcedure::from_endpoint,
        ))
    }

    /// Create an async caller with the default configuration.
    pub fn create_caller(&self, context: impl Into<ContextFactory<Ctx>>) -> AsyncCaller<Ctx> {
        make_caller(
            self,
            Dispatcher::new(self.clone()),
            context.into(),
            AsyncProcedure::from_endpoint,
        )
    }

    /// Create an async caller with a custom configuration.
    pub fn create_caller_with_config(
        &self,
        context: impl Into<ContextFactory<Ctx>>,
        config: RpcConfig,
    ) -> Result<AsyncCaller<Ctx>, ConfigValidationError> {
        let dispatcher = Dispatcher::with_config(self.clone(), config)?;
        Ok(make_caller(
            self,
            dispatcher,
            context.into(),
            AsyncProcedure::from_endpoint,
        ))
    }
}
