//! Busy-wait mutual exclusion.

use crate::backoff::{Backoff, BackoffPolicy};
use std::sync::atomic::{AtomicU32, Ordering};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// A test-and-test-and-set spinlock over a single `u32` word.
///
/// The lock carries no data and is `#[repr(transparent)]`, so the same type
/// serves as the writer lock word inside a shared-memory header. Zeroed memory
/// is a valid unlocked lock.
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct SpinLock {
    word: AtomicU32,
}

/// Releases the lock with `Release` ordering when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(UNLOCKED),
        }
    }

    /// Spin until the lock is acquired.
    ///
    /// While the word is held by someone else the loop only reads it, so
    /// waiters share the cache line instead of bouncing it with failed CAS.
    pub fn lock(&self) -> SpinGuard<'_> {
        let mut backoff = Backoff::new(BackoffPolicy::Exponential);
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            while self.word.load(Ordering::Relaxed) != UNLOCKED {
                backoff.snooze();
            }
        }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_>> {
        self.word
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinGuard { lock: self })
    }
}

impl Drop for SpinGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.word.store(UNLOCKED, Ordering::Release);
    }
}
