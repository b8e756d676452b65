//! Atomic memory-ordering layer.
//!
//! Ring cursors are plain `u64` counters that only ever grow. Wrapping them in
//! [`Sequence`] keeps the ordering of every access visible in the method name
//! (`acquire`, `store_release`, ...) instead of buried in an argument.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Pads and aligns a value to a 64-byte cache line.
///
/// Producer- and consumer-owned cursors live on separate lines so that a
/// writer bumping its cursor does not invalidate the line readers poll.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// A monotonically non-decreasing position counter.
///
/// `#[repr(transparent)]` over `AtomicU64`, so it can be placed inside a
/// memory-mapped header shared between processes.
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct Sequence(AtomicU64);

impl Sequence {
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Load without synchronizing. Only valid for the thread that owns the
    /// counter or under an external lock.
    #[inline(always)]
    pub fn relaxed(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Load and synchronize with the `store_release` that produced the value.
    #[inline(always)]
    pub fn acquire(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Publish `value`; every write sequenced before this store is visible to
    /// a thread whose `acquire` observes it.
    #[inline(always)]
    pub fn store_release(&self, value: u64) {
        self.0.store(value, Ordering::Release);
    }

    /// Try to move the counter from `observed` to `observed + 1`.
    ///
    /// On success the caller exclusively owns position `observed`. On failure
    /// the current value is returned so the caller can retry from it. May fail
    /// spuriously, so it belongs inside a retry loop.
    #[inline(always)]
    pub fn claim(&self, observed: u64) -> Result<u64, u64> {
        self.0
            .compare_exchange_weak(observed, observed + 1, Ordering::AcqRel, Ordering::Relaxed)
    }

    /// Strong compare-and-swap from `current` to `new`.
    #[inline(always)]
    pub fn compare_exchange(&self, current: u64, new: u64) -> Result<u64, u64> {
        self.0
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
    }
}
