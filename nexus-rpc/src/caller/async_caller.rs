//! Async caller

use super::{CallerTree, Endpoint};
use crate::dispatch::CancellationSignal;
use crate::middleware::ProcedureType;
use crate::RpcResult;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A caller whose leaves return futures.
pub type AsyncCaller<Ctx> = CallerTree<AsyncProcedure<Ctx>>;

/// A leaf of an [`AsyncCaller`].
pub struct AsyncProcedure<Ctx: Clone + Send + Sync + 'static> {
    pub(super) endpoint: Endpoint<Ctx>,
}

impl<Ctx: Clone + Send + Sync + 'static> AsyncProcedure<Ctx> {
    pub(super) fn from_endpoint(endpoint: Endpoint<Ctx>) -> Self {
        Self { endpoint }
    }

    /// Full dotted path of the procedure.
    pub fn path(&self) -> &str {
        &self.endpoint.path
    }

    /// Kind the procedure was registered as.
    pub fn kind(&self) -> ProcedureType {
        self.endpoint.kind
    }

    /// Whether the procedure validates its input.
    pub fn has_input(&self) -> bool {
        self.endpoint.has_input
    }

    /// Call without input.
    pub async fn call(&self) -> RpcResult<Value> {
        self.call_with(Value::Null).await
    }

    /// Call with `input`.
    pub async fn call_with<I: Serialize>(&self, input: I) -> RpcResult<Value> {
        self.run(input, None).await
    }

    /// Call with `input`, failing with `CANCELLED` at the next step boundary
    /// once `signal` fires.
    pub async fn call_with_signal<I: Serialize>(
        &self,
        input: I,
        signal: &CancellationSignal,
    ) -> RpcResult<Value> {
        self.run(input, Some(signal)).await
    }

    async fn run<I: Serialize>(
        &self,
        input: I,
        signal: Option<&CancellationSignal>,
    ) -> RpcResult<Value> {
        let result = match self.endpoint.encode(input) {
            Ok(input) => {
                let shared = &self.endpoint.shared;
                shared
                    .dispatcher
                    .dispatch_with_signal(
                        &self.endpoint.path,
                        self.endpoint.kind,
                        input,
                        shared.context.create(),
                        signal,
                    )
                    .await
            }
            Err(err) => Err(err),
        };
        self.endpoint.finish(result)
    }
}

impl<Ctx: Clone + Send + Sync + 'static> fmt::Debug for AsyncProcedure<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AsyncProcedure").field(&self.endpoint).finish()
    }
}
