//! Run/stop control shared by the periodic tasks.
//!
//! A [`TaskControl`] is owned by one periodic task (the scheduler or the
//! script bridge) and shared with whoever stops it. Flags are atomics so the
//! loop can check them without locking; a [`Notify`] wakes a loop that is
//! waiting for its next interval.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Running/stop-requested state for one periodic task.
#[derive(Debug, Default)]
pub struct TaskControl {
    /// Whether the task loop is currently running.
    running: AtomicBool,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes loops waiting in [`stopped`](Self::stopped).
    stop_notify: Notify,
}

impl TaskControl {
    /// A stopped control with no pending stop request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the running state. Returns `false` if the task was already
    /// running.
    pub fn mark_running(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the running state.
    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the task loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request a stop and wake any waiting loop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Forget a previous stop request so the task can be started again.
    pub fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::Release);
    }

    /// Wait until a stop is requested.
    ///
    /// Returns immediately if one already has been.
    pub async fn stopped(&self) {
        loop {
            // Register before checking the flag so a concurrent
            // `request_stop` cannot slip between the two.
            let notified = self.stop_notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}
