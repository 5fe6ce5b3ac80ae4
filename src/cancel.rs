// Cooperative cancellation flag shared between the controller and one worker.
//
// The flag is the only piece of state both threads mutate. Everything else
// (the worker's step counter, the controller's run handle) stays confined to
// its own thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Thread-safe boolean used to request cooperative cancellation.
///
/// Clones share the same underlying flag, so the controller keeps one handle
/// and passes another to the worker it spawns. Setting the flag does not stop
/// the worker by force; the worker observes it at its next check point, at
/// the boundary between two units of work.
///
/// All accesses use sequentially consistent ordering. The flag orders nothing
/// beyond itself; there is no other shared data for it to publish.
#[derive(Clone, Debug)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new flag, initialized to "not cancelled".
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Read the current value. Safe to call from any thread.
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Store a new value. Safe to call from any thread.
    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }

    /// Request cancellation. The sole cancellation entry point used by the
    /// controller; equivalent to `set(true)`.
    pub fn request_cancel(&self) {
        self.set(true);
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_flag_is_clear() {
        let flag = CancelFlag::new();
        assert!(!flag.get());
    }

    #[test]
    fn test_set_then_get() {
        let flag = CancelFlag::new();

        flag.set(true);
        assert!(flag.get());

        flag.set(false);
        assert!(!flag.get());
    }

    #[test]
    fn test_request_cancel() {
        let flag = CancelFlag::new();
        flag.request_cancel();
        assert!(flag.get());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();

        other.request_cancel();
        assert!(flag.get());
    }

    #[test]
    fn test_visible_across_threads() {
        let flag = CancelFlag::new();
        let remote = flag.clone();

        std::thread::spawn(move || {
            remote.request_cancel();
        })
        .join()
        .unwrap();

        assert!(flag.get());
    }
}
