//! Process-wide lifecycle state: the running flag and the two callback
//! slots the signal dispatcher reads.
//!
//! Registration is expected to finish before signal delivery begins.
//! The slots still swap atomically, so a late re-registration can never
//! be observed half-written by the dispatch thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// Callback invoked from the signal dispatch thread.
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Shared {
    running: AtomicBool,
    shutdown: Mutex<Option<LifecycleCallback>>,
    rehash: Mutex<Option<LifecycleCallback>>,
}

/// Handle to the shared lifecycle state.
///
/// Clones share the same state. The hosting application owns the
/// `running` flag (single writer); the dispatcher only reads the
/// callback slots.
#[derive(Clone, Default)]
pub struct LifecycleController {
    shared: Arc<Shared>,
}

impl LifecycleController {
    /// Creates a controller with `running = false` and empty slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the main loop as started or stopped. Only the hosting
    /// application's startup and shutdown code should write this flag.
    pub fn set_running(&self, running: bool) {
        self.shared.running.store(running, Ordering::SeqCst);
    }

    /// Whether the main loop is marked as running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Registers the callback run on a TERMINATE signal.
    ///
    /// Replaces any previous registration; there is no unregistration.
    /// Callers that want "no handler" pass a no-op.
    pub fn set_shutdown_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.shutdown.lock() = Some(Arc::new(handler));
        debug!("Shutdown handler set");
    }

    /// Registers the callback run on a REHASH signal.
    ///
    /// Same replacement semantics as [`set_shutdown_handler`].
    ///
    /// [`set_shutdown_handler`]: LifecycleController::set_shutdown_handler
    pub fn set_rehash_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.rehash.lock() = Some(Arc::new(handler));
        debug!("Rehash handler set");
    }

    pub(crate) fn shutdown_handler(&self) -> Option<LifecycleCallback> {
        self.shared.shutdown.lock().clone()
    }

    pub(crate) fn rehash_handler(&self) -> Option<LifecycleCallback> {
        self.shared.rehash.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_new_controller_state() {
        let controller = LifecycleController::new();
        assert!(!controller.is_running());
        assert!(controller.shutdown_handler().is_none());
        assert!(controller.rehash_handler().is_none());
    }

    #[test]
    fn test_running_flag() {
        let controller = LifecycleController::new();
        controller.set_running(true);
        assert!(controller.is_running());
        controller.set_running(false);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_clones_share_state() {
        let controller = LifecycleController::new();
        let clone = controller.clone();
        controller.set_running(true);
        assert!(clone.is_running());
    }

    #[test]
    fn test_registration_replaces() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let controller = LifecycleController::new();
        let counter = first.clone();
        controller.set_shutdown_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second.clone();
        controller.set_shutdown_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        controller.shutdown_handler().unwrap()();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_slots_are_independent() {
        let controller = LifecycleController::new();
        controller.set_rehash_handler(|| {});
        assert!(controller.shutdown_handler().is_none());
        assert!(controller.rehash_handler().is_some());
    }
}
