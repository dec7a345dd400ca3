//! Countdown latch shared by all tools in a run
//!
//! The coordinator sizes the latch to the number of tools and waits on it;
//! each tool counts it down once when its start phase is over, whether the
//! start produced anything useful or not.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub struct CountdownLatch {
    count: Mutex<usize>,
    zero: Condvar,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // The counter stays consistent even if a holder panicked
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decrement the count, waking all waiters when it reaches zero
    pub fn count_down(&self) {
        let mut count = self.lock();
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.zero.notify_all();
            }
        }
    }

    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Block until the count reaches zero
    pub fn wait(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self
                .zero
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the count reaches zero or the timeout elapses.
    /// Returns `true` if the latch opened.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.lock();
        while *count > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            count = self
                .zero
                .wait_timeout(count, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Counts the latch down exactly once when dropped
pub struct LatchGuard {
    latch: Option<Arc<CountdownLatch>>,
}

impl LatchGuard {
    pub fn new(latch: Arc<CountdownLatch>) -> Self {
        Self { latch: Some(latch) }
    }

    /// Count down now instead of at drop
    pub fn release(mut self) {
        if let Some(latch) = self.latch.take() {
            latch.count_down();
        }
    }
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        if let Some(latch) = self.latch.take() {
            latch.count_down();
        }
    }
}
