//! Context types for dependency injection

use std::fmt;
use std::sync::Arc;

/// Context wrapper providing access to caller-supplied state
///
/// A context is never mutated in place. Middleware that needs to hand
/// something different downstream builds a new one with [`Context::derive`]
/// or [`Context::new`], so every call sees its own chain of values.
#[derive(Clone)]
pub struct Context<T: Clone + Send + Sync + 'static> {
    inner: Arc<T>,
}

impl<T: Clone + Send + Sync + 'static> Context<T> {
    /// Create a new context wrapping the given value
    pub fn new(ctx: T) -> Self {
        Self {
            inner: Arc::new(ctx),
        }
    }

    /// Get a reference to the inner context
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Get the Arc for sharing
    pub fn arc(&self) -> Arc<T> {
        self.inner.clone()
    }

    /// Build a new context from this one.
    ///
    /// ```rust,ignore
    /// let ctx = ctx.derive(|c| AppContext { user: Some(user), ..c.clone() });
    /// ```
    pub fn derive(&self, f: impl FnOnce(&T) -> T) -> Self {
        Self::new(f(&self.inner))
    }

    /// Returns true if both contexts point at the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + Send + Sync + 'static> std::ops::Deref for Context<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Clone + Send + Sync + 'static + Default> Default for Context<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + 'static + fmt::Debug> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Context").field(&self.inner).finish()
    }
}

/// Empty context for routers that don't need state
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct EmptyContext;

/// Produces the base context for each call made through a caller.
///
/// Either a fixed value (shared by every call) or a function run once per call.
///
/// ```rust,ignore
/// let fixed = ContextFactory::from(AppContext::default());
/// let fresh = ContextFactory::new(|| AppContext::from_env());
/// ```
pub struct ContextFactory<T: Clone + Send + Sync + 'static> {
    source: ContextSource<T>,
}

enum ContextSource<T: Clone + Send + Sync + 'static> {
    Value(Context<T>),
    Factory(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone + Send + Sync + 'static> ContextFactory<T> {
    /// Create a factory that runs `f` for every call.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            source: ContextSource::Factory(Arc::new(f)),
        }
    }

    /// Create a factory that hands out the same context to every call.
    pub fn from_value(ctx: T) -> Self {
        Self {
            source: ContextSource::Value(Context::new(ctx)),
        }
    }

    /// Produce the base context for one call.
    pub fn create(&self) -> Context<T> {
        match &self.source {
            ContextSource::Value(ctx) => ctx.clone(),
            ContextSource::Factory(f) => Context::new(f()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for ContextFactory<T> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            ContextSource::Value(ctx) => ContextSource::Value(ctx.clone()),
            ContextSource::Factory(f) => ContextSource::Factory(f.clone()),
        };
        Self { source }
    }
}

impl<T: Clone + Send + Sync + 'static> From<T> for ContextFactory<T> {
    fn from(ctx: T) -> Self {
        Self::from_value(ctx)
    }
}

impl<T: Clone + Send + Sync + 'static> From<Context<T>> for ContextFactory<T> {
    fn from(ctx: Context<T>) -> Self {
        Self {
            source: ContextSource::Value(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    struct Session {
        user: Option<String>,
    }

    #[test]
    fn derive_leaves_the_original_untouched() {
        let base = Context::new(Session { user: None });
        let derived = base.derive(|s| Session {
            user: Some(format!("{}-admin", s.user.as_deref().unwrap_or("anon"))),
        });

        assert_eq!(base.user, None);
        assert_eq!(derived.user.as_deref(), Some("anon-admin"));
        assert!(!base.ptr_eq(&derived));
    }

    #[test]
    fn fixed_factory_shares_one_value() {
        let factory = ContextFactory::from(Session {
            user: Some("bob".into()),
        });
        let a = factory.create();
        let b = factory.create();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn function_factory_runs_per_call() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let factory = ContextFactory::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            EmptyContext
        });

        factory.create();
        factory.clone().create();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
