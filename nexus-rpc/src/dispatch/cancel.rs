//! Cancellation signal

use crate::RpcError;
use crate::middleware::Request;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Cancellation signal for in-flight calls.
///
/// Share it (usually behind an `Arc`) between the code running the call and
/// the code that may cancel it. Once cancelled it stays cancelled.
///
/// ```rust,ignore
/// let signal = Arc::new(CancellationSignal::new());
/// let call = dispatcher.dispatch_with_signal("report.build", kind, input, ctx, Some(&signal));
/// signal.cancel(); // the next step boundary fails with CANCELLED
/// ```
#[derive(Debug)]
pub struct CancellationSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    /// Create a new cancellation signal
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Cancel the signal
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Check if cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancelled
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        let mut notified = std::pin::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Fail with `CANCELLED` if `signal` has fired before `stage` starts.
pub(crate) fn check(
    signal: Option<&CancellationSignal>,
    request: &Request,
    stage: &'static str,
) -> Result<(), RpcError> {
    if signal.is_some_and(CancellationSignal::is_cancelled) {
        tracing::debug!(
            call_id = %request.call_id,
            path = %request.path,
            stage = stage,
            "Call cancelled"
        );
        return Err(RpcError::cancelled(&request.path));
    }
    Ok(())
}
