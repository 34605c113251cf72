use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cancellation flag the poll loop checks at every wait point.
///
/// Waits sleep on a condvar, so [`trigger`](Self::trigger) wakes a waiting
/// loop immediately instead of after the full interval.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    triggered: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter
    pub fn trigger(&self) {
        // taking the lock orders the store against a waiter's predicate check
        let _guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        self.triggered.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` if shutdown was requested.
    pub fn wait(&self, duration: Duration) -> bool {
        let guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let (_guard, _) = self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_shutdown())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_shutdown()
    }
}
