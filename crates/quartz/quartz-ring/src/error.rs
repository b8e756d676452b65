use crate::config::RingFlags;
use std::fmt;

/// Rejected ring or channel configuration. Raised only at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidParam {
    #[error("capacity {0} is not a non-zero power of two")]
    Capacity(usize),

    #[error("more than one write strategy selected: {0:?}")]
    ConflictingWrite(RingFlags),

    #[error("contradictory read strategies selected: {0:?}")]
    ConflictingRead(RingFlags),

    #[error("READ_ONCE claims need the coordinated wait path and cannot be combined with READ_BUSY")]
    BusyClaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryReadError {
    #[error("no message is available yet")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out waiting for a message")]
pub struct ReadTimeout;

/// The channel was closed; the rejected value is handed back.
#[derive(PartialEq, Eq, thiserror::Error)]
#[error("sending on a closed channel")]
pub struct SendError<T>(pub T);

#[derive(PartialEq, Eq, thiserror::Error)]
pub enum TrySendError<T> {
    #[error("channel is full")]
    Full(T),
    #[error("channel is closed")]
    Closed(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    #[error("channel is empty")]
    Empty,
    #[error("channel is closed and drained")]
    Closed,
}

impl<T> SendError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(value) | Self::Closed(value) => value,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

// Payloads need not be Debug.
impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError").finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}
