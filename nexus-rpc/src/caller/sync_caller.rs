//! Synchronous caller

use super::{CallerTree, Endpoint};
use crate::dispatch::{Settlement, settle};
use crate::middleware::ProcedureType;
use crate::{RpcError, RpcResult};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A caller whose leaves return results directly.
pub type SyncCaller<Ctx> = CallerTree<SyncProcedure<Ctx>>;

/// A leaf of a [`SyncCaller`].
///
/// Each call runs the whole dispatch in place, polling it exactly once. If any
/// step would have to wait (a suspending validator, middleware or resolver),
/// the call is abandoned and fails with `ASYNC_NOT_SUPPORTED`. Nothing keeps
/// running after that.
pub struct SyncProcedure<Ctx: Clone + Send + Sync + 'static> {
    pub(super) endpoint: Endpoint<Ctx>,
}

impl<Ctx: Clone + Send + Sync + 'static> SyncProcedure<Ctx> {
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

    /// Call without input. Same as `call_with(Value::Null)`.
    pub fn call(&self) -> RpcResult<Value> {
        self.call_with(Value::Null)
    }

    /// Call with `input`.
    pub fn call_with<I: Serialize>(&self, input: I) -> RpcResult<Value> {
        let result = self.endpoint.encode(input).and_then(|input| {
            let shared = &self.endpoint.shared;
            let ctx = shared.context.create();
            let call = shared
                .dispatcher
                .dispatch(&self.endpoint.path, self.endpoint.kind, input, ctx);

            match settle(call) {
                Settlement::Settled(result) => result,
                Settlement::Pending => {
                    tracing::debug!(
                        path = %self.endpoint.path,
                        "Call did not complete synchronously"
                    );
                    Err(RpcError::async_not_supported(&self.endpoint.path))
                }
            }
        });
        self.endpoint.finish(result)
    }
}

impl<Ctx: Clone + Send + Sync + 'static> fmt::Debug for SyncProcedure<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SyncProcedure").field(&self.endpoint).finish()
    }
}
