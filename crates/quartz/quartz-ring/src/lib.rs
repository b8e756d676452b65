//! Bounded, fixed-capacity ring buffers for inter-thread message transfer.
//!
//! [`RingBuffer`] moves small `Copy` handles (pointers, offsets, packed ids)
//! between threads through a power-of-two slot array. Its behaviour is chosen
//! once at construction:
//!
//! | write mode | who may write | mechanism |
//! |---|---|---|
//! | [`WriteMode::Locked`] | any number of threads | mutex around claim + store + publish |
//! | [`WriteMode::SingleWriter`] | exactly one thread | load / store / release-publish |
//! | [`WriteMode::BusyRetry`] | any number of threads | CAS claim with retry |
//!
//! | read mode | delivery | waiting |
//! |---|---|---|
//! | [`ReadMode::WaitBroadcast`] | every reader sees every message | futex sleep |
//! | [`ReadMode::BusyBroadcast`] | every reader sees every message | spin |
//! | [`ReadMode::SingleReader`] | one reader | spin, then single-waiter sleep |
//! | [`ReadMode::CompetingConsumers`] | each message to exactly one reader | futex sleep |
//!
//! Broadcast rings never block a writer for a slow reader: a reader that falls
//! more than `capacity` positions behind loses the overwritten messages and
//! its [`Cursor`] jumps forward. The competing-consumer mode is lossless and
//! reports "full" to writers instead.
//!
//! [`Channel`] is the sibling bounded queue for owned values with
//! lock/condvar/spin strategies on each side.

mod buffer;
mod channel;
mod config;
mod cursor;
mod error;
pub mod index;
mod slot;

pub use buffer::RingBuffer;
pub use channel::{Channel, ChannelRead, ChannelWrite};
pub use config::{ReadMode, RingConfig, RingFlags, WriteMode};
pub use cursor::Cursor;
pub use error::{InvalidParam, ReadTimeout, SendError, TryReadError, TryRecvError, TrySendError};
pub use quartz_sync::BackoffPolicy;
pub use slot::{Observed, Slot};
