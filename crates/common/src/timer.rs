//! Timer capability used to bound request attempts

use futures::future::BoxFuture;
use std::time::Duration;

/// Source of delays. Injected so tests can drive time deterministically.
pub trait Timer: Send + Sync + 'static {
    /// Future that completes once `duration` has elapsed.
    ///
    /// The deadline is fixed when this is called, not when the future is
    /// first polled.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Timer backed by the tokio time driver.
///
/// Honors `tokio::time::pause`, so it runs on virtual time in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
