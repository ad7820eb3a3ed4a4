//! Entries of a router tree

use super::Router;
use crate::procedure::Procedure;
use std::fmt;

/// One named entry of a router: a procedure or a nested router.
pub enum RouterNode<Ctx: Clone + Send + Sync + 'static> {
    /// A leaf
    Procedure(Procedure<Ctx>),
    /// A nested namespace
    Router(Router<Ctx>),
}

impl<Ctx: Clone + Send + Sync + 'static> RouterNode<Ctx> {
    /// The procedure, if this entry is a leaf.
    pub fn as_procedure(&self) -> Option<&Procedure<Ctx>> {
        match self {
            Self::Procedure(procedure) => Some(procedure),
            Self::Router(_) => None,
        }
    }

    /// The nested router, if this entry is a namespace.
    pub fn as_router(&self) -> Option<&Router<Ctx>> {
        match self {
            Self::Procedure(_) => None,
            Self::Router(router) => Some(router),
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> Clone for RouterNode<Ctx> {
    fn clone(&self) -> Self {
        match self {
            Self::Procedure(procedure) => Self::Procedure(procedure.clone()),
            Self::Router(router) => Self::Router(router.clone()),
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> From<Procedure<Ctx>> for RouterNode<Ctx> {
    fn from(procedure: Procedure<Ctx>) -> Self {
        Self::Procedure(procedure)
    }
}

impl<Ctx: Clone + Send + Sync + 'static> From<Router<Ctx>> for RouterNode<Ctx> {
    fn from(router: Router<Ctx>) -> Self {
        Self::Router(router)
    }
}

impl<Ctx: Clone + Send + Sync + 'static> fmt::Debug for RouterNode<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Procedure(procedure) => procedure.fmt(f),
            Self::Router(router) => router.fmt(f),
        }
    }
}
