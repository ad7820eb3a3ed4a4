//! Tree-shaped caller surface

use crate::{RpcError, RpcResult};
use std::collections::BTreeMap;
use std::fmt;

/// A tree mirroring a router: same names, same nesting, with a callable leaf
/// `L` in place of every procedure.
pub struct CallerTree<L> {
    children: BTreeMap<String, CallerNode<L>>,
}

/// One entry of a [`CallerTree`].
pub enum CallerNode<L> {
    /// A callable leaf
    Procedure(L),
    /// A nested namespace
    Router(CallerTree<L>),
}

impl<L> CallerTree<L> {
    pub(crate) fn new(children: BTreeMap<String, CallerNode<L>>) -> Self {
        Self { children }
    }

    /// The entry named `name`, if any.
    pub fn get(&self, name: &str) -> Option<&CallerNode<L>> {
        self.children.get(name)
    }

    /// The leaf named `name`.
    ///
    /// Fails with `NOT_FOUND` when there is no such entry or it is a namespace.
    pub fn procedure(&self, name: &str) -> RpcResult<&L> {
        match self.children.get(name) {
            Some(CallerNode::Procedure(leaf)) => Ok(leaf),
            Some(CallerNode::Router(_)) => Err(RpcError::not_found(format!(
                "'{}' is a namespace, not a procedure",
                name
            ))),
            None => Err(RpcError::procedure_not_found(name)),
        }
    }

    /// The namespace named `name`.
    pub fn router(&self, name: &str) -> RpcResult<&CallerTree<L>> {
        match self.children.get(name) {
            Some(CallerNode::Router(tree)) => Ok(tree),
            Some(CallerNode::Procedure(_)) => Err(RpcError::not_found(format!(
                "'{}' is a procedure, not a namespace",
                name
            ))),
            None => Err(RpcError::not_found(format!("Namespace '{}' not found", name))),
        }
    }

    /// The leaf at a dotted `path`, e.g. `post.delete`.
    pub fn at(&self, path: &str) -> RpcResult<&L> {
        let (namespaces, name) = match path.rsplit_once('.') {
            Some((namespaces, name)) => (Some(namespaces), name),
            None => (None, path),
        };

        let mut tree = self;
        for segment in namespaces.into_iter().flat_map(|ns| ns.split('.')) {
            tree = tree
                .router(segment)
                .map_err(|_| RpcError::procedure_not_found(path))?;
        }
        tree.procedure(name)
            .map_err(|_| RpcError::procedure_not_found(path))
    }

    /// Entry names at this level, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Number of entries at this level.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether this level has no entries.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl<L: fmt::Debug> fmt::Debug for CallerTree<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.children.iter()).finish()
    }
}

impl<L: fmt::Debug> fmt::Debug for CallerNode<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Procedure(leaf) => leaf.fmt(f),
            Self::Router(tree) => tree.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RpcErrorCode;

    fn tree() -> CallerTree<&'static str> {
        let post = CallerTree::new(BTreeMap::from([
            ("delete".to_string(), CallerNode::Procedure("post.delete")),
            ("list".to_string(), CallerNode::Procedure("post.list")),
        ]));
        CallerTree::new(BTreeMap::from([
            ("hello".to_string(), CallerNode::Procedure("hello")),
            ("post".to_string(), CallerNode::Router(post)),
        ]))
    }

    #[test]
    fn walks_names_and_paths() {
        let tree = tree();
        assert_eq!(*tree.procedure("hello").unwrap(), "hello");
        assert_eq!(*tree.router("post").unwrap().procedure("delete").unwrap(), "post.delete");
        assert_eq!(*tree.at("post.list").unwrap(), "post.list");
        assert_eq!(tree.names().collect::<Vec<_>>(), ["hello", "post"]);
    }

    #[test]
    fn missing_entries_are_not_found() {
        let tree = tree();
        for path in ["goodbye", "post", "post.create", "hello.world", ""] {
            assert_eq!(tree.at(path).unwrap_err().code, RpcErrorCode::NotFound, "{path:?}");
        }
        assert_eq!(tree.router("hello").unwrap_err().code, RpcErrorCode::NotFound);
    }
}
