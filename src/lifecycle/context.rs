//! Shared runtime context.
//!
//! Holds the event loop handle and the bus connection every subsystem works
//! through. The daemon builds exactly one per run and releases the bus once
//! the loop has returned; after that `bus()` reports `BusError::Unavailable`
//! to any late callback still holding the context.

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::bus::{BusConnection, BusError};

/// Shared reference to the live bus connection.
pub type BusRef = Arc<Box<dyn BusConnection>>;

/// Event loop plus bus connection, shared by all subsystems.
pub struct RuntimeContext {
    handle: Handle,
    bus: ArcSwapOption<Box<dyn BusConnection>>,
}

impl RuntimeContext {
    pub fn new(handle: Handle, bus: Box<dyn BusConnection>) -> Self {
        Self {
            handle,
            bus: ArcSwapOption::from_pointee(bus),
        }
    }

    /// The shared event loop.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Schedule work on the shared event loop.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// The shared bus connection, as long as it has not been released.
    pub fn bus(&self) -> Result<BusRef, BusError> {
        self.bus.load_full().ok_or(BusError::Unavailable)
    }

    pub fn is_connected(&self) -> bool {
        self.bus.load().is_some()
    }

    /// Drop the context's reference to the bus connection.
    pub fn release_bus(&self) {
        if self.bus.swap(None).is_some() {
            tracing::debug!("Bus connection released");
        }
    }

    /// Release the bus when the returned guard goes out of scope.
    pub fn release_on_drop(self: &Arc<Self>) -> BusReleaseGuard {
        BusReleaseGuard {
            context: Arc::clone(self),
        }
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Releases the bus connection on drop, including during unwinding.
#[must_use = "the bus is released as soon as the guard is dropped"]
pub struct BusReleaseGuard {
    context: Arc<RuntimeContext>,
}

impl Drop for BusReleaseGuard {
    fn drop(&mut self) {
        self.context.release_bus();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{LocalBus, MatchRule};

    fn context() -> Arc<RuntimeContext> {
        Arc::new(RuntimeContext::new(
            Handle::current(),
            Box::new(LocalBus::default()),
        ))
    }

    #[tokio::test]
    async fn bus_available_until_released() {
        let ctx = context();
        assert!(ctx.is_connected());
        assert!(ctx.bus().unwrap().add_match(MatchRule::any()).is_ok());

        ctx.release_bus();
        assert!(!ctx.is_connected());
        assert_eq!(ctx.bus().err(), Some(BusError::Unavailable));

        // Releasing twice is harmless.
        ctx.release_bus();
    }

    #[tokio::test]
    async fn guard_releases_on_drop() {
        let ctx = context();
        {
            let _guard = ctx.release_on_drop();
            assert!(ctx.is_connected());
        }
        assert!(!ctx.is_connected());
    }

    #[tokio::test]
    async fn spawns_on_shared_loop() {
        let ctx = context();
        let out = ctx.spawn(async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }
}
