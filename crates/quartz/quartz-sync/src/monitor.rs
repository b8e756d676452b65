use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub use parking_lot::MutexGuard;

/// A mutex and the condition variable that waits on it.
///
/// Used by the locked write path, the blocking channel strategies and, on
/// platforms without a native futex, by [`WaitWord`](crate::WaitWord).
#[derive(Debug, Default)]
pub struct Monitor<T> {
    state: Mutex<T>,
    cond: Condvar,
}

impl<T> Monitor<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            cond: Condvar::new(),
        }
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock()
    }

    /// Atomically release `guard`, sleep until notified, and re-acquire.
    /// Wakeups may be spurious; callers re-check their condition.
    #[inline]
    pub fn wait(&self, guard: &mut MutexGuard<'_, T>) {
        self.cond.wait(guard);
    }

    /// Like [`wait`](Self::wait) with an upper bound. Returns `true` if the
    /// timeout elapsed.
    #[inline]
    pub fn wait_for(&self, guard: &mut MutexGuard<'_, T>, timeout: Duration) -> bool {
        self.cond.wait_for(guard, timeout).timed_out()
    }

    /// Returns `true` if `deadline` passed before a notification arrived.
    #[inline]
    pub fn wait_until(&self, guard: &mut MutexGuard<'_, T>, deadline: Instant) -> bool {
        self.cond.wait_until(guard, deadline).timed_out()
    }

    #[inline]
    pub fn notify_one(&self) -> bool {
        self.cond.notify_one()
    }

    #[inline]
    pub fn notify_all(&self) -> usize {
        self.cond.notify_all()
    }
}
