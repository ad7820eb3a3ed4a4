//! Typed views over caller leaves
//!
//! A typed handle fixes the input and output types of one leaf, so the
//! arguments are checked by the compiler and results come back deserialized.
//! `call()` only exists on handles whose input type is `()`.
//!
//! ```rust,ignore
//! let delete = caller.at("post.delete")?.typed::<usize, ()>();
//! delete.call_with(0)?;
//!
//! let hello = caller.procedure("hello")?.typed::<(), String>();
//! assert_eq!(hello.call()?, "world");
//! ```

use super::{AsyncProcedure, Endpoint, SyncProcedure};
use crate::dispatch::CancellationSignal;
use crate::{RpcError, RpcResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

impl<Ctx: Clone + Send + Sync + 'static> Endpoint<Ctx> {
    fn decode<Out: DeserializeOwned>(&self, value: Value) -> RpcResult<Out> {
        serde_json::from_value(value).map_err(|err| {
            tracing::debug!(path = %self.path, error = %err, "Result does not match the typed handle");
            RpcError::internal(format!(
                "Result of '{}' does not match the expected type: {}",
                self.path, err
            ))
            .with_cause(err)
        })
    }
}

/// A [`SyncProcedure`] with fixed input and output types.
pub struct TypedSyncProcedure<'a, Ctx: Clone + Send + Sync + 'static, In, Out> {
    leaf: &'a SyncProcedure<Ctx>,
    _types: PhantomData<fn(In) -> Out>,
}

impl<Ctx: Clone + Send + Sync + 'static> SyncProcedure<Ctx> {
    /// View this leaf as taking `In` and returning `Out`.
    pub fn typed<In, Out>(&self) -> TypedSyncProcedure<'_, Ctx, In, Out>
    where
        In: Serialize,
        Out: DeserializeOwned,
    {
        TypedSyncProcedure {
            leaf: self,
            _types: PhantomData,
        }
    }
}

impl<'a, Ctx, In, Out> TypedSyncProcedure<'a, Ctx, In, Out>
where
    Ctx: Clone + Send + Sync + 'static,
    In: Serialize,
    Out: DeserializeOwned,
{
    /// The untyped leaf.
    pub fn leaf(&self) -> &'a SyncProcedure<Ctx> {
        self.leaf
    }

    /// Call with `input`.
    pub fn call_with(&self, input: In) -> RpcResult<Out> {
        let value = self.leaf.call_with(input)?;
        self.leaf.endpoint.decode(value)
    }
}

impl<Ctx, Out> TypedSyncProcedure<'_, Ctx, (), Out>
where
    Ctx: Clone + Send + Sync + 'static,
    Out: DeserializeOwned,
{
    /// Call a procedure that takes no input.
    pub fn call(&self) -> RpcResult<Out> {
        self.call_with(())
    }
}

impl<Ctx: Clone + Send + Sync + 'static, In, Out> fmt::Debug for TypedSyncProcedure<'_, Ctx, In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedSyncProcedure").field(&self.leaf.endpoint).finish()
    }
}

/// An [`AsyncProcedure`] with fixed input and output types.
pub struct TypedAsyncProcedure<'a, Ctx: Clone + Send + Sync + 'static, In, Out> {
    leaf: &'a AsyncProcedure<Ctx>,
    _types: PhantomData<fn(In) -> Out>,
}

impl<Ctx: Clone + Send + Sync + 'static> AsyncProcedure<Ctx> {
    /// View this leaf as taking `In` and returning `Out`.
    pub fn typed<In, Out>(&self) -> TypedAsyncProcedure<'_, Ctx, In, Out>
    where
        In: Serialize,
        Out: DeserializeOwned,
    {
        TypedAsyncProcedure {
            leaf: self,
            _types: PhantomData,
        }
    }
}

impl<'a, Ctx, In, Out> TypedAsyncProcedure<'a, Ctx, In, Out>
where
    Ctx: Clone + Send + Sync + 'static,
    In: Serialize,
    Out: DeserializeOwned,
{
    /// The untyped leaf.
    pub fn leaf(&self) -> &'a AsyncProcedure<Ctx> {
        self.leaf
    }

    /// Call with `input`.
    pub async fn call_with(&self, input: In) -> RpcResult<Out> {
        let value = self.leaf.call_with(input).await?;
        self.leaf.endpoint.decode(value)
    }

    /// Call with `input`, failing with `CANCELLED` once `signal` fires.
    pub async fn call_with_signal(&self, input: In, signal: &CancellationSignal) -> RpcResult<Out> {
        let value = self.leaf.call_with_signal(input, signal).await?;
        self.leaf.endpoint.decode(value)
    }
}

impl<Ctx, Out> TypedAsyncProcedure<'_, Ctx, (), Out>
where
    Ctx: Clone + Send + Sync + 'static,
    Out: DeserializeOwned,
{
    /// Call a procedure that takes no input.
    pub async fn call(&self) -> RpcResult<Out> {
        self.call_with(()).await
    }
}

impl<Ctx: Clone + Send + Sync + 'static, In, Out> fmt::Debug for TypedAsyncProcedure<'_, Ctx, In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedAsyncProcedure").field(&self.leaf.endpoint).finish()
    }
}
