//! Stamped ring slots.
//!
//! Every slot pairs a payload cell with a 64-bit `stamp` that says which
//! position the cell currently belongs to. Two protocols use it:
//!
//! **Broadcast (seqlock)** — lossy, many readers, no reader bookkeeping.
//!
//! ```text
//! stamp == 2p + 1   write of position p in progress
//! stamp == 2p + 2   position p published and stable
//! ```
//!
//! Writer: CAS the stamp to the odd value, write the payload, store the even
//! value. Reader at position p: load stamp, copy payload, load stamp again;
//! the copy is valid only if both loads saw exactly `2p + 2`. Anything smaller
//! means "not yet", anything larger means the slot was lapped. Stamps only
//! grow, so a stalled writer can never overwrite a newer lap.
//!
//! **Exclusive (claim)** — lossless, used by the competing-consumer mode.
//!
//! ```text
//! stamp == 2p       slot free for position p
//! stamp == 2p + 1   slot holds the message for position p
//! ```
//!
//! Slot `i` starts free for position `i`. A writer fills position `p` once the
//! slot is free for it; the reader that claims `p` takes the payload and marks
//! the slot free for `p + capacity`. "Holds p" and "free for p + 1" never
//! share a stamp, which keeps a one-slot ring from overwriting an unclaimed
//! message.

use std::cell::UnsafeCell;
use std::hint;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering, fence};

/// Outcome of a broadcast read of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed<T> {
    /// The slot holds position `p`. `None` is the end-of-stream sentinel.
    Ready(Option<T>),
    /// Position `p` has not been published yet.
    Pending,
    /// The slot has moved on to (at least) the given newer position.
    Lapped(u64),
}

/// One ring slot: a stamp plus a `Copy` payload (or the sentinel).
///
/// `#[repr(C, align(64))]` so the layout is stable inside shared memory and
/// neighbouring slots never share a cache line.
#[repr(C, align(64))]
pub struct Slot<T> {
    stamp: AtomicU64,
    data: UnsafeCell<MaybeUninit<Option<T>>>,
}

// SAFETY: concurrent access to `data` is arbitrated by `stamp` (see module docs).
unsafe impl<T: Send> Sync for Slot<T> {}

#[inline(always)]
fn writing(position: u64) -> u64 {
    position * 2 + 1
}

#[inline(always)]
fn published(position: u64) -> u64 {
    position * 2 + 2
}

/// Exclusive stamp of a slot free for `position`.
#[inline(always)]
pub(crate) const fn vacant(position: u64) -> u64 {
    position * 2
}

/// Exclusive stamp of a slot holding the message for `position`.
#[inline(always)]
pub(crate) const fn filled(position: u64) -> u64 {
    position * 2 + 1
}

/// Position a non-zero broadcast stamp refers to.
#[inline(always)]
fn stamp_position(stamp: u64) -> u64 {
    (stamp - 1) / 2
}

impl<T: Copy> Slot<T> {
    pub const fn new(stamp: u64) -> Self {
        Self {
            stamp: AtomicU64::new(stamp),
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    // ─── Exclusive protocol ────────────────────────────────────────────────

    #[inline(always)]
    pub fn stamp(&self) -> u64 {
        self.stamp.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn set_stamp(&self, stamp: u64) {
        self.stamp.store(stamp, Ordering::Release);
    }

    /// # Safety
    /// The caller must own the slot: it won the claim for the slot's current
    /// position and no reader can touch the payload until `set_stamp`.
    #[inline(always)]
    pub unsafe fn store(&self, msg: Option<T>) {
        // SAFETY: exclusive ownership guaranteed by the caller.
        unsafe { (*self.data.get()).write(msg) };
    }

    /// # Safety
    /// The slot must hold a payload published for the position the caller
    /// has claimed.
    #[inline(always)]
    pub unsafe fn take(&self) -> Option<T> {
        // SAFETY: initialized by the matching `store`, per the caller.
        unsafe { (*self.data.get()).assume_init_read() }
    }

    // ─── Broadcast protocol ────────────────────────────────────────────────

    /// Publish `msg` as position `position`.
    ///
    /// Returns `false` without writing if a newer lap already owns the slot;
    /// the message is then lost, exactly as if a reader had been lapped.
    /// Waits only for an older, still in-flight write to the same slot.
    pub fn publish(&self, position: u64, msg: Option<T>) -> bool {
        let odd = writing(position);
        loop {
            let current = self.stamp.load(Ordering::Relaxed);
            if current >= odd {
                return false;
            }
            if current & 1 == 1 {
                hint::spin_loop();
                continue;
            }
            if self
                .stamp
                .compare_exchange_weak(current, odd, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
        // Orders the odd stamp before the payload bytes: a reader that sees
        // any of the new bytes also sees a changed stamp on its second load.
        fence(Ordering::Release);
        // SAFETY: the odd stamp makes us the only writer of this slot.
        unsafe { ptr::write_volatile(self.data.get(), MaybeUninit::new(msg)) };
        self.stamp.store(odd + 1, Ordering::Release);
        true
    }

    /// Read position `position` if (and only if) the slot currently holds it.
    pub fn observe(&self, position: u64) -> Observed<T> {
        let expected = published(position);
        let before = self.stamp.load(Ordering::Acquire);
        if before < expected {
            return Observed::Pending;
        }
        if before > expected {
            return Observed::Lapped(stamp_position(before));
        }

        // SAFETY: reading a MaybeUninit is always allowed; the bytes are only
        // interpreted after the stamp check below proves they were not torn.
        let raw = unsafe { ptr::read_volatile(self.data.get()) };
        fence(Ordering::Acquire);
        let after = self.stamp.load(Ordering::Relaxed);
        if after != before {
            return Observed::Lapped(stamp_position(after));
        }
        // SAFETY: the stamp was `2p + 2` before and after the copy, so the
        // payload was fully written for position p and not modified since.
        Observed::Ready(unsafe { raw.assume_init() })
    }
}
