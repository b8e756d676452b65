//! Bounded, lossless queue for owned values.
//!
//! Same slot/cursor layout as the ring (power-of-two slots, monotonically
//! increasing `head`/`tail`), but a slot is only reused after it has been
//! read, values are moved rather than copied, and each side picks how it
//! serializes and waits:
//!
//! | side | `Sync` | `Mutex` | `Spin` / `Busy` |
//! |---|---|---|---|
//! | write | mutex + sleep on "not full" | mutex, yield while full | spinlock, spin while full |
//! | read | mutex + sleep on "not empty" | mutex, yield while empty | spinlock, spin while empty |

use crate::error::{InvalidParam, ReadTimeout, SendError, TryRecvError, TrySendError};
use crate::index::{mask_for, slot_index};
use parking_lot::Mutex;
use quartz_sync::{Backoff, BackoffPolicy, CachePadded, Monitor, Sequence, SpinLock};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelWrite {
    /// Block on a condition variable while full.
    #[default]
    Sync,
    Mutex,
    Spin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelRead {
    /// Block on a condition variable while empty.
    #[default]
    Sync,
    Mutex,
    Busy,
}

pub struct Channel<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: u64,
    /// Next position to read.
    head: CachePadded<Sequence>,
    /// Next position to write.
    tail: CachePadded<Sequence>,
    write: ChannelWrite,
    read: ChannelRead,
    closed: AtomicBool,
    /// Writer lock for `ChannelWrite::Sync`; its condvar means "not full".
    not_full: Monitor<()>,
    /// Reader lock for `ChannelRead::Sync`; its condvar means "not empty".
    not_empty: Monitor<()>,
    write_mutex: Mutex<()>,
    read_mutex: Mutex<()>,
    write_spin: SpinLock,
    read_spin: SpinLock,
}

// SAFETY: slots are only accessed by the writer or reader that currently
// holds the side's lock, and ownership of each value passes through the
// release/acquire pair on `tail` (write → read) and `head` (read → write).
unsafe impl<T: Send> Send for Channel<T> {}
unsafe impl<T: Send> Sync for Channel<T> {}

impl<T> Channel<T> {
    /// # Errors
    /// [`InvalidParam::Capacity`] if `capacity` is zero or not a power of two.
    pub fn new(capacity: usize, write: ChannelWrite, read: ChannelRead) -> Result<Self, InvalidParam> {
        let mask = mask_for(capacity)?;
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        tracing::debug!(capacity, ?write, ?read, "channel created");
        Ok(Self {
            slots,
            mask,
            head: CachePadded::new(Sequence::new(0)),
            tail: CachePadded::new(Sequence::new(0)),
            write,
            read,
            closed: AtomicBool::new(false),
            not_full: Monitor::new(()),
            not_empty: Monitor::new(()),
            write_mutex: Mutex::new(()),
            read_mutex: Mutex::new(()),
            write_spin: SpinLock::new(),
            read_spin: SpinLock::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        let tail = self.tail.acquire();
        let head = self.head.acquire();
        tail.saturating_sub(head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Refuse further sends and wake every blocked sender and receiver.
    /// Values already queued can still be received.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        {
            let _guard = self.not_full.lock();
            self.not_full.notify_all();
        }
        let _guard = self.not_empty.lock();
        self.not_empty.notify_all();
    }

    // ─── Sending ──────────────────────────────────────────────────────────

    /// Queue `value` without waiting.
    ///
    /// # Errors
    /// [`TrySendError::Full`] when every slot is occupied,
    /// [`TrySendError::Closed`] after [`close`](Self::close).
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        if self.is_closed() {
            return Err(TrySendError::Closed(value));
        }
        let pushed = match self.write {
            ChannelWrite::Sync => {
                let _guard = self.not_full.lock();
                // SAFETY: the "not full" monitor lock serializes Sync writers.
                unsafe { self.push(value) }
            }
            ChannelWrite::Mutex => {
                let _guard = self.write_mutex.lock();
                // SAFETY: `write_mutex` serializes Mutex writers.
                unsafe { self.push(value) }
            }
            ChannelWrite::Spin => {
                let _guard = self.write_spin.lock();
                // SAFETY: `write_spin` serializes Spin writers.
                unsafe { self.push(value) }
            }
        };
        match pushed {
            Ok(()) => {
                self.wake_reader();
                Ok(())
            }
            Err(value) => Err(TrySendError::Full(value)),
        }
    }

    /// Queue `value`, waiting for space according to the write strategy.
    ///
    /// # Errors
    /// [`SendError`] if the channel is (or becomes) closed; the value is
    /// handed back.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        match self.write {
            ChannelWrite::Sync => {
                let mut guard = self.not_full.lock();
                let mut value = value;
                loop {
                    if self.is_closed() {
                        return Err(SendError(value));
                    }
                    // SAFETY: the "not full" monitor lock serializes Sync writers.
                    match unsafe { self.push(value) } {
                        Ok(()) => break,
                        Err(back) => {
                            value = back;
                            self.not_full.wait(&mut guard);
                        }
                    }
                }
                drop(guard);
                self.wake_reader();
                Ok(())
            }
            ChannelWrite::Mutex | ChannelWrite::Spin => {
                let policy = match self.write {
                    ChannelWrite::Spin => BackoffPolicy::Spin,
                    _ => BackoffPolicy::Yield,
                };
                let mut backoff = Backoff::new(policy);
                let mut value = value;
                loop {
                    match self.try_send(value) {
                        Ok(()) => return Ok(()),
                        Err(TrySendError::Closed(back)) => return Err(SendError(back)),
                        Err(TrySendError::Full(back)) => {
                            value = back;
                            backoff.snooze();
                        }
                    }
                }
            }
        }
    }

    // ─── Receiving ────────────────────────────────────────────────────────

    /// # Errors
    /// [`TryRecvError::Empty`] when nothing is queued,
    /// [`TryRecvError::Closed`] when closed and fully drained.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let popped = match self.read {
            ChannelRead::Sync => {
                let _guard = self.not_empty.lock();
                // SAFETY: the "not empty" monitor lock serializes Sync readers.
                unsafe { self.pop() }
            }
            ChannelRead::Mutex => {
                let _guard = self.read_mutex.lock();
                // SAFETY: `read_mutex` serializes Mutex readers.
                unsafe { self.pop() }
            }
            ChannelRead::Busy => {
                let _guard = self.read_spin.lock();
                // SAFETY: `read_spin` serializes Busy readers.
                unsafe { self.pop() }
            }
        };
        match popped {
            Some(value) => {
                self.wake_writer();
                Ok(value)
            }
            None => Err(self.empty_or_closed()),
        }
    }

    /// Receive the next value, waiting according to the read strategy.
    /// Returns `None` once the channel is closed and drained.
    pub fn recv(&self) -> Option<T> {
        self.recv_until(None).ok().flatten()
    }

    /// # Errors
    /// [`ReadTimeout`] when nothing arrived within `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, ReadTimeout> {
        self.recv_until(Some(Instant::now() + timeout))
    }

    fn recv_until(&self, deadline: Option<Instant>) -> Result<Option<T>, ReadTimeout> {
        match self.read {
            ChannelRead::Sync => {
                let mut guard = self.not_empty.lock();
                loop {
                    // SAFETY: the "not empty" monitor lock serializes Sync readers.
                    if let Some(value) = unsafe { self.pop() } {
                        drop(guard);
                        self.wake_writer();
                        return Ok(Some(value));
                    }
                    if self.is_closed() {
                        // SAFETY: still holding the reader lock.
                        let last = unsafe { self.pop() };
                        drop(guard);
                        if last.is_some() {
                            self.wake_writer();
                        }
                        return Ok(last);
                    }
                    match deadline {
                        None => self.not_empty.wait(&mut guard),
                        Some(deadline) => {
                            if self.not_empty.wait_until(&mut guard, deadline) {
                                // SAFETY: still holding the reader lock.
                                return match unsafe { self.pop() } {
                                    Some(value) => {
                                        drop(guard);
                                        self.wake_writer();
                                        Ok(Some(value))
                                    }
                                    None => Err(ReadTimeout),
                                };
                            }
                        }
                    }
                }
            }
            ChannelRead::Mutex | ChannelRead::Busy => {
                let policy = match self.read {
                    ChannelRead::Busy => BackoffPolicy::Spin,
                    _ => BackoffPolicy::Yield,
                };
                let got = Backoff::spin_until(policy, deadline, || match self.try_recv() {
                    Ok(value) => Some(Some(value)),
                    Err(TryRecvError::Closed) => Some(None),
                    Err(TryRecvError::Empty) => None,
                });
                got.ok_or(ReadTimeout)
            }
        }
    }

    // ─── Internals ────────────────────────────────────────────────────────

    /// # Safety
    /// Caller must hold the writer-side lock.
    unsafe fn push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.relaxed();
        let head = self.head.acquire();
        if tail - head >= self.capacity() as u64 {
            return Err(value);
        }
        let cell = &self.slots[slot_index(tail, self.mask)];
        // SAFETY: the slot is free (head has moved past its previous lap) and
        // writers are serialized by the caller's lock.
        unsafe { (*cell.get()).write(value) };
        self.tail.store_release(tail + 1);
        Ok(())
    }

    /// # Safety
    /// Caller must hold the reader-side lock.
    unsafe fn pop(&self) -> Option<T> {
        let head = self.head.relaxed();
        let tail = self.tail.acquire();
        if head == tail {
            return None;
        }
        let cell = &self.slots[slot_index(head, self.mask)];
        // SAFETY: `tail > head` means the value was fully written and
        // published; readers are serialized by the caller's lock.
        let value = unsafe { (*cell.get()).assume_init_read() };
        self.head.store_release(head + 1);
        Some(value)
    }

    fn empty_or_closed(&self) -> TryRecvError {
        if self.is_closed() && self.is_empty() {
            TryRecvError::Closed
        } else {
            TryRecvError::Empty
        }
    }

    fn wake_reader(&self) {
        if self.read == ChannelRead::Sync {
            let _guard = self.not_empty.lock();
            self.not_empty.notify_one();
        }
    }

    fn wake_writer(&self) {
        if self.write == ChannelWrite::Sync {
            let _guard = self.not_full.lock();
            self.not_full.notify_one();
        }
    }
}

impl<T> Drop for Channel<T> {
    fn drop(&mut self) {
        let head = self.head.relaxed();
        let tail = self.tail.relaxed();
        for position in head..tail {
            let cell = &mut self.slots[slot_index(position, self.mask)];
            // SAFETY: positions in [head, tail) hold initialized values that
            // were never received; `&mut self` rules out concurrent access.
            unsafe { cell.get_mut().assume_init_drop() };
        }
    }
}
