//! Router implementation with builder pattern
//!
//! A [`Router`] is a tree of named procedures and nested routers. Building it
//! checks every key and flattens the tree into one table of dotted paths, so
//! `{ post: { delete } }` is reachable as `post.delete`.
//!
//! ```rust,ignore
//! let posts = Router::builder()
//!     .procedure("list", list_posts)
//!     .procedure("delete", delete_post)
//!     .build()?;
//!
//! let app = Router::builder()
//!     .procedure("hello", hello)
//!     .merge("post", posts)
//!     .build()?;
//!
//! assert_eq!(app.procedures(), ["hello", "post.delete", "post.list"]);
//! ```

mod core;
mod node;

pub use self::core::{Router, RouterBuilder, router};
pub use node::RouterNode;
