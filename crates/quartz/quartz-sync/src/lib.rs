//! Low-level synchronization primitives shared by the quartz ring buffers.
//!
//! Everything here is small and load-bearing:
//! - [`Sequence`] / [`CachePadded`]: monotonically increasing positions with
//!   the memory ordering spelled out at every call site.
//! - [`Backoff`]: the tunable spin/yield policy used by every retry loop.
//! - [`SpinLock`]: test-and-test-and-set lock word (usable inside shared memory).
//! - [`WaitWord`]: futex-style "wait while the word equals X" / wake.
//! - [`Monitor`]: mutex + condition variable.
//! - [`Notifier`]: event count built on [`WaitWord`] for "sleep until a
//!   predicate becomes true" without missed wakeups.

mod atomic;
mod backoff;
#[cfg(target_os = "linux")]
mod futex;
mod monitor;
mod notifier;
mod spin;
mod wait;

pub use atomic::{CachePadded, Sequence};
pub use backoff::{Backoff, BackoffPolicy};
pub use monitor::{Monitor, MutexGuard};
pub use notifier::Notifier;
pub use spin::{SpinGuard, SpinLock};
pub use wait::{WaitResult, WaitWord};
