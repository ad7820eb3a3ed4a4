//! Core router types
//!
//! [`RouterBuilder`] collects named entries; [`RouterBuilder::build`]
//! validates them and produces an immutable [`Router`].

use super::RouterNode;
use crate::middleware::ProcedureType;
use crate::procedure::Procedure;
use crate::validation::validate_segment;
use crate::{BuildError, EmptyContext, RpcError, RpcResult};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

struct RouterInner<Ctx: Clone + Send + Sync + 'static> {
    /// Direct entries, in key order
    children: BTreeMap<String, RouterNode<Ctx>>,
    /// Every procedure reachable from this router, by dotted path
    table: HashMap<String, Procedure<Ctx>>,
}

/// An immutable tree of procedures.
///
/// Cheap to clone; clones share the same tree. Holds no mutable state, so
/// concurrent calls need no locking.
pub struct Router<Ctx: Clone + Send + Sync + 'static = EmptyContext> {
    inner: Arc<RouterInner<Ctx>>,
}

impl<Ctx: Clone + Send + Sync + 'static> Router<Ctx> {
    /// Start a new router.
    pub fn builder() -> RouterBuilder<Ctx> {
        RouterBuilder::new()
    }

    /// Look up the procedure registered at `path`.
    pub fn resolve(&self, path: &str) -> RpcResult<&Procedure<Ctx>> {
        self.inner.table.get(path).ok_or_else(|| {
            tracing::debug!(path = %path, "Procedure not found");

            let mut error = RpcError::procedure_not_found(path);
            if !self.inner.table.is_empty() {
                error = error.with_details(serde_json::json!({
                    "available_procedures": self.procedures(),
                    "requested": path
                }));
            }
            error
        })
    }

    /// Like [`resolve`](Self::resolve), without building an error.
    pub fn get(&self, path: &str) -> Option<&Procedure<Ctx>> {
        self.inner.table.get(path)
    }

    /// List all registered procedure paths, sorted
    pub fn procedures(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.inner.table.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Check if a path is a subscription
    pub fn is_subscription(&self, path: &str) -> bool {
        self.get(path)
            .is_some_and(|procedure| procedure.kind() == ProcedureType::Subscription)
    }

    /// Direct entries of this router, in key order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &RouterNode<Ctx>)> {
        self.inner
            .children
            .iter()
            .map(|(name, node)| (name.as_str(), node))
    }

    /// Number of procedures reachable from this router.
    pub fn len(&self) -> usize {
        self.inner.table.len()
    }

    /// Whether the router has no procedures at all.
    pub fn is_empty(&self) -> bool {
        self.inner.table.is_empty()
    }
}

impl<Ctx: Clone + Send + Sync + 'static> Clone for Router<Ctx> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> fmt::Debug for Router<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.children()).finish()
    }
}

/// Collects entries for a [`Router`].
///
/// Keys are only checked in [`build`](Self::build), which reports the first
/// problem it finds.
pub struct RouterBuilder<Ctx: Clone + Send + Sync + 'static = EmptyContext> {
    entries: Vec<(String, RouterNode<Ctx>)>,
}

impl<Ctx: Clone + Send + Sync + 'static> RouterBuilder<Ctx> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a procedure under `name`.
    #[must_use]
    pub fn procedure(self, name: impl Into<String>, procedure: Procedure<Ctx>) -> Self {
        self.entry(name, RouterNode::Procedure(procedure))
    }

    /// Nest `router` under `name`.
    #[must_use]
    pub fn merge(self, name: impl Into<String>, router: Router<Ctx>) -> Self {
        self.entry(name, RouterNode::Router(router))
    }

    /// Add any entry under `name`.
    #[must_use]
    pub fn entry(mut self, name: impl Into<String>, node: impl Into<RouterNode<Ctx>>) -> Self {
        self.entries.push((name.into(), node.into()));
        self
    }

    /// Validate the entries and flatten them into a router.
    ///
    /// Fails with [`BuildError::InvalidSegment`] for a key that is not a valid
    /// path segment and [`BuildError::DuplicatePath`] when two entries end up
    /// at the same path.
    pub fn build(self) -> Result<Router<Ctx>, BuildError> {
        let mut children = BTreeMap::new();
        let mut table = HashMap::new();

        for (name, node) in self.entries {
            validate_segment(&name)?;

            match &node {
                RouterNode::Procedure(procedure) => {
                    insert_path(&mut table, name.clone(), procedure.clone())?;
                }
                RouterNode::Router(nested) => {
                    for (path, procedure) in &nested.inner.table {
                        insert_path(&mut table, format!("{}.{}", name, path), procedure.clone())?;
                    }
                }
            }

            if children.contains_key(&name) {
                return Err(BuildError::DuplicatePath { path: name });
            }
            children.insert(name, node);
        }

        tracing::debug!(procedures = table.len(), "Router built");

        Ok(Router {
            inner: Arc::new(RouterInner { children, table }),
        })
    }
}

impl<Ctx: Clone + Send + Sync + 'static> Default for RouterBuilder<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_path<Ctx: Clone + Send + Sync + 'static>(
    table: &mut HashMap<String, Procedure<Ctx>>,
    path: String,
    procedure: Procedure<Ctx>,
) -> Result<(), BuildError> {
    if table.contains_key(&path) {
        return Err(BuildError::DuplicatePath { path });
    }
    table.insert(path, procedure);
    Ok(())
}

/// Build a router from `(name, entry)` pairs.
///
/// ```rust,ignore
/// let app = router([
///     ("hello", hello.into()),
///     ("post", router([("delete", delete_post.into())])?.into()),
/// ])?;
/// ```
pub fn router<Ctx, N, I>(entries: I) -> Result<Router<Ctx>, BuildError>
where
    Ctx: Clone + Send + Sync + 'static,
    N: Into<String>,
    I: IntoIterator<Item = (N, RouterNode<Ctx>)>,
{
    entries
        .into_iter()
        .fold(RouterBuilder::new(), |builder, (name, node)| {
            builder.entry(name, node)
        })
        .build()
}
