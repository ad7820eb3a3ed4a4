//! Immediate resolution of dispatch futures

use futures::FutureExt;
use std::future::Future;

/// Outcome of polling a future exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T> {
    /// The future completed on its first poll
    Settled(T),
    /// The future would have suspended; it has been dropped
    Pending,
}

impl<T> Settlement<T> {
    /// Whether the future completed.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }

    /// The output, if the future completed.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Settled(value) => Some(value),
            Self::Pending => None,
        }
    }
}

/// Poll `future` once, without a runtime, and report whether it completed.
///
/// A future that returns `Pending` is dropped, so no work keeps running in
/// the background.
pub fn settle<F: Future>(future: F) -> Settlement<F::Output> {
    match future.now_or_never() {
        Some(value) => Settlement::Settled(value),
        None => Settlement::Pending,
    }
}
