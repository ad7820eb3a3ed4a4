//! Call dispatch
//!
//! [`Dispatcher`] runs one call against a [`Router`](crate::Router):
//!
//! 1. check the path and resolve it (`BAD_REQUEST` / `NOT_FOUND`)
//! 2. check the requested kind against the procedure's (`BAD_REQUEST`)
//! 3. check the raw input size (`PAYLOAD_TOO_LARGE`)
//! 4. parse the input (`BAD_REQUEST`)
//! 5. run the middleware chain, in registration order
//! 6. run the resolver with the final context
//! 7. check the output (`INTERNAL`)
//!
//! Steps 4 to 7 run under a panic guard, and an optional
//! [`CancellationSignal`] is checked before each of them.

mod cancel;
mod chain;
mod core;
mod settle;

pub use self::core::{Dispatcher, dispatch};
pub use cancel::CancellationSignal;
pub use settle::{Settlement, settle};
