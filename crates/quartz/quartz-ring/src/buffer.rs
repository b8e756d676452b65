//! The ring buffer: fixed slot array, write cursor, optional shared read cursor.
//!
//! # Write side
//! - `Locked`: mutex around "load cursor → publish slot → store cursor".
//! - `SingleWriter`: the same sequence without the mutex.
//! - `BusyRetry`: CAS the cursor forward to claim a position, then publish.
//!   The cursor may run ahead of the slots, which is why readers trust slot
//!   stamps rather than the cursor.
//!
//! # Read side
//! Broadcast readers carry a [`Cursor`] and read slot `position & mask` with
//! the seqlock protocol from [`Slot`]. Competing consumers claim positions
//! from the shared `read_cursor` with the exclusive protocol, and writers get
//! `false` back when every slot still holds an unclaimed message.

use crate::config::{ReadMode, RingConfig, RingFlags, WriteMode};
use crate::cursor::Cursor;
use crate::error::{InvalidParam, ReadTimeout, TryReadError};
use crate::index::slot_index;
use crate::slot::{Observed, Slot, filled, vacant};
use parking_lot::Mutex;
use quartz_sync::{Backoff, CachePadded, Notifier, Sequence};
use std::time::{Duration, Instant};

pub struct RingBuffer<T: Copy + Send> {
    slots: Box<[Slot<T>]>,
    mask: u64,
    /// Next position to be claimed by a writer.
    write_cursor: CachePadded<Sequence>,
    /// Next position to be claimed by a reader through the shared cursor.
    read_cursor: CachePadded<Sequence>,
    /// Serializes writers in [`WriteMode::Locked`].
    write_lock: Mutex<()>,
    /// Sleeping readers (wait, single-reader and competing modes).
    readers: Notifier,
    config: RingConfig,
}

impl<T: Copy + Send> RingBuffer<T> {
    /// Allocates the slot array. No further allocation happens afterwards.
    pub fn new(config: RingConfig) -> Self {
        let exclusive = config.read_mode() == ReadMode::CompetingConsumers;
        let slots: Box<[Slot<T>]> = (0..config.capacity() as u64)
            .map(|i| Slot::new(if exclusive { vacant(i) } else { 0 }))
            .collect();

        tracing::debug!(
            capacity = config.capacity(),
            write = ?config.write_mode(),
            read = ?config.read_mode(),
            backoff = ?config.backoff(),
            "ring buffer created"
        );

        Self {
            slots,
            mask: config.mask(),
            write_cursor: CachePadded::new(Sequence::new(0)),
            read_cursor: CachePadded::new(Sequence::new(0)),
            write_lock: Mutex::new(()),
            readers: Notifier::new(),
            config,
        }
    }

    /// Create a ring from a capacity and a mode bitmask.
    ///
    /// # Errors
    /// See [`RingConfig::from_flags`].
    pub fn with_flags(capacity: usize, flags: RingFlags) -> Result<Self, InvalidParam> {
        Ok(Self::new(RingConfig::from_flags(capacity, flags)?))
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    #[inline]
    pub fn modes(&self) -> (WriteMode, ReadMode) {
        (self.config.write_mode(), self.config.read_mode())
    }

    /// The writer frontier: number of positions claimed by writers so far.
    #[inline]
    pub fn write_position(&self) -> u64 {
        self.write_cursor.acquire()
    }

    /// The shared read cursor, if this ring has one.
    pub fn read_position(&self) -> Option<u64> {
        (self.config.read_mode() == ReadMode::CompetingConsumers).then(|| self.read_cursor.acquire())
    }

    /// A broadcast cursor starting at the first message ever written.
    pub fn cursor(&self) -> Cursor {
        Cursor::new()
    }

    /// A broadcast cursor that only sees messages written from now on.
    pub fn tail_cursor(&self) -> Cursor {
        Cursor::at(self.write_position())
    }

    // ─── Write side ───────────────────────────────────────────────────────

    /// Publish `value`.
    ///
    /// Broadcast rings always accept the write, overwriting the oldest slot
    /// if needed. A competing-consumer ring returns `false` when full,
    /// leaving retry or drop to the caller.
    #[inline]
    pub fn write(&self, value: T) -> bool {
        self.publish(Some(value))
    }

    /// Publish the end-of-stream sentinel.
    ///
    /// Broadcast readers all observe a single sentinel. In competing-consumer
    /// mode the sentinel is claimed like any other message, so publish one per
    /// consumer. Returns `false` under the same condition as [`write`](Self::write).
    #[inline]
    pub fn close(&self) -> bool {
        self.publish(None)
    }

    fn publish(&self, msg: Option<T>) -> bool {
        let accepted = if self.config.read_mode().is_broadcast() {
            self.broadcast(msg);
            true
        } else {
            self.enqueue(msg)
        };
        if accepted {
            match self.config.read_mode() {
                ReadMode::WaitBroadcast => self.readers.notify_all(),
                ReadMode::SingleReader | ReadMode::CompetingConsumers => self.readers.notify_one(),
                ReadMode::BusyBroadcast => {}
            }
        }
        accepted
    }

    fn broadcast(&self, msg: Option<T>) {
        match self.config.write_mode() {
            WriteMode::Locked => {
                let _guard = self.write_lock.lock();
                self.broadcast_next(msg);
            }
            WriteMode::SingleWriter => self.broadcast_next(msg),
            WriteMode::BusyRetry => {
                let mut backoff = Backoff::new(self.config.backoff());
                let mut observed = self.write_cursor.relaxed();
                let position = loop {
                    match self.write_cursor.claim(observed) {
                        Ok(position) => break position,
                        Err(actual) => {
                            observed = actual;
                            backoff.spin();
                        }
                    }
                };
                self.slot(position).publish(position, msg);
            }
        }
    }

    /// Single-writer publication: only the caller (or the lock holder) moves
    /// the cursor, so a plain load is enough and the release store publishes.
    #[inline(always)]
    fn broadcast_next(&self, msg: Option<T>) {
        let position = self.write_cursor.relaxed();
        self.slot(position).publish(position, msg);
        self.write_cursor.store_release(position + 1);
    }

    fn enqueue(&self, msg: Option<T>) -> bool {
        match self.config.write_mode() {
            WriteMode::Locked => {
                let _guard = self.write_lock.lock();
                self.enqueue_next(msg)
            }
            WriteMode::SingleWriter => self.enqueue_next(msg),
            WriteMode::BusyRetry => self.enqueue_contended(msg),
        }
    }

    #[inline(always)]
    fn enqueue_next(&self, msg: Option<T>) -> bool {
        let position = self.write_cursor.relaxed();
        let slot = self.slot(position);
        if slot.stamp() != vacant(position) {
            // previous lap not yet claimed by a consumer
            return false;
        }
        // SAFETY: the slot is free for `position` and we are the only writer.
        unsafe { slot.store(msg) };
        slot.set_stamp(filled(position));
        self.write_cursor.store_release(position + 1);
        true
    }

    fn enqueue_contended(&self, msg: Option<T>) -> bool {
        let mut backoff = Backoff::new(self.config.backoff());
        let mut position = self.write_cursor.relaxed();
        loop {
            let slot = self.slot(position);
            let stamp = slot.stamp();
            let free = vacant(position);
            if stamp == free {
                match self.write_cursor.claim(position) {
                    Ok(_) => {
                        // SAFETY: winning the claim on a free slot makes it ours.
                        unsafe { slot.store(msg) };
                        slot.set_stamp(filled(position));
                        return true;
                    }
                    Err(actual) => {
                        position = actual;
                        backoff.spin();
                    }
                }
            } else if stamp < free {
                return false;
            } else {
                position = self.write_cursor.relaxed();
            }
        }
    }

    // ─── Broadcast read side ──────────────────────────────────────────────

    /// Read the message at `cursor`, waiting according to the read mode.
    ///
    /// Returns `Some(value)` and advances the cursor, or `None` for the
    /// end-of-stream sentinel. The cursor stays on the sentinel, so every
    /// later call returns `None` again.
    ///
    /// On a competing-consumer ring the cursor is ignored and the message is
    /// claimed from the shared cursor, as with [`read_shared`](Self::read_shared).
    pub fn read(&self, cursor: &mut Cursor) -> Option<T> {
        self.wait_for(None, || self.poll(cursor).ok()).flatten()
    }

    /// Non-blocking [`read`](Self::read).
    ///
    /// # Errors
    /// [`TryReadError::Empty`] when nothing is published at the cursor yet.
    pub fn try_read(&self, cursor: &mut Cursor) -> Result<Option<T>, TryReadError> {
        self.poll(cursor)
    }

    /// [`read`](Self::read) with an upper bound on the wait.
    ///
    /// # Errors
    /// [`ReadTimeout`] when nothing arrived within `timeout`.
    pub fn read_timeout(&self, cursor: &mut Cursor, timeout: Duration) -> Result<Option<T>, ReadTimeout> {
        let deadline = Instant::now() + timeout;
        self.wait_for(Some(deadline), || self.poll(cursor).ok())
            .ok_or(ReadTimeout)
    }

    fn poll(&self, cursor: &mut Cursor) -> Result<Option<T>, TryReadError> {
        if !self.config.read_mode().is_broadcast() {
            return self.dequeue();
        }
        let capacity = self.capacity() as u64;
        loop {
            let frontier = self.write_cursor.acquire();
            cursor.keep_up(frontier, capacity);
            if cursor.position() >= frontier {
                return Err(TryReadError::Empty);
            }
            match self.slot(cursor.position()).observe(cursor.position()) {
                Observed::Ready(Some(value)) => {
                    cursor.advance();
                    return Ok(Some(value));
                }
                Observed::Ready(None) => return Ok(None),
                Observed::Pending => return Err(TryReadError::Empty),
                // The slot now holds `newer`, so everything up to
                // `newer - capacity` is gone.
                Observed::Lapped(newer) => cursor.skip_to(newer + 1 - capacity),
            }
        }
    }

    // ─── Shared-cursor read side ──────────────────────────────────────────

    /// Claim the next message from the shared cursor, waiting if none is
    /// available. Each message is returned to exactly one caller. `None` is a
    /// claimed end-of-stream sentinel.
    ///
    /// On a broadcast ring the shared cursor still hands each message to at
    /// most one caller, but keeps broadcast loss semantics: lapped messages are
    /// skipped and the sentinel is not consumed.
    pub fn read_shared(&self) -> Option<T> {
        self.wait_for(None, || self.poll_shared().ok()).flatten()
    }

    /// Non-blocking [`read_shared`](Self::read_shared).
    ///
    /// # Errors
    /// [`TryReadError::Empty`] when no unclaimed message is available.
    pub fn try_read_shared(&self) -> Result<Option<T>, TryReadError> {
        self.poll_shared()
    }

    /// [`read_shared`](Self::read_shared) with an upper bound on the wait.
    ///
    /// # Errors
    /// [`ReadTimeout`] when nothing could be claimed within `timeout`.
    pub fn read_shared_timeout(&self, timeout: Duration) -> Result<Option<T>, ReadTimeout> {
        let deadline = Instant::now() + timeout;
        self.wait_for(Some(deadline), || self.poll_shared().ok())
            .ok_or(ReadTimeout)
    }

    fn poll_shared(&self) -> Result<Option<T>, TryReadError> {
        if self.config.read_mode().is_broadcast() {
            self.claim_broadcast()
        } else {
            self.dequeue()
        }
    }

    fn dequeue(&self) -> Result<Option<T>, TryReadError> {
        let capacity = self.capacity() as u64;
        let mut backoff = Backoff::new(self.config.backoff());
        let mut position = self.read_cursor.relaxed();
        loop {
            let slot = self.slot(position);
            let stamp = slot.stamp();
            let ready = filled(position);
            if stamp == ready {
                match self.read_cursor.claim(position) {
                    Ok(_) => {
                        // SAFETY: the claim gives us sole access to `position`,
                        // whose payload was published before stamp became ready.
                        let msg = unsafe { slot.take() };
                        slot.set_stamp(vacant(position + capacity));
                        return Ok(msg);
                    }
                    Err(actual) => {
                        position = actual;
                        backoff.spin();
                    }
                }
            } else if stamp < ready {
                return Err(TryReadError::Empty);
            } else {
                position = self.read_cursor.relaxed();
            }
        }
    }

    fn claim_broadcast(&self) -> Result<Option<T>, TryReadError> {
        let mut backoff = Backoff::new(self.config.backoff());
        loop {
            let start = self.read_cursor.acquire();
            let mut cursor = Cursor::at(start);
            match self.poll(&mut cursor)? {
                None => return Ok(None),
                Some(value) => {
                    if self.read_cursor.compare_exchange(start, cursor.position()).is_ok() {
                        return Ok(Some(value));
                    }
                    backoff.spin();
                }
            }
        }
    }

    // ─── Waiting ──────────────────────────────────────────────────────────

    /// Run `poll` until it succeeds, waiting between attempts the way the
    /// read mode prescribes. `None` only if `deadline` passes.
    fn wait_for<R>(&self, deadline: Option<Instant>, mut poll: impl FnMut() -> Option<R>) -> Option<R> {
        match self.config.read_mode() {
            ReadMode::WaitBroadcast | ReadMode::CompetingConsumers => {
                self.readers.wait_until(deadline, poll)
            }
            ReadMode::BusyBroadcast => Backoff::spin_until(self.config.backoff(), deadline, poll),
            ReadMode::SingleReader => {
                let mut backoff = Backoff::new(self.config.backoff());
                while !backoff.is_completed() {
                    if let Some(value) = poll() {
                        return Some(value);
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return None;
                    }
                    backoff.snooze();
                }
                self.readers.wait_until(deadline, poll)
            }
        }
    }

    #[inline(always)]
    fn slot(&self, position: u64) -> &Slot<T> {
        &self.slots[slot_index(position, self.mask)]
    }
}
