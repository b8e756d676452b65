use crate::buffer::RingBuffer;
use crate::index::apply_overrun_policy;

/// A broadcast reader's position in the message stream.
///
/// Owned by the reader, never registered with the ring: the ring does not
/// know how many readers exist or how far behind they are. A cursor that falls
/// more than `capacity` positions behind is moved forward on its next read and
/// the skipped positions are counted in [`overruns`](Self::overruns).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    position: u64,
    overruns: u64,
}

impl Cursor {
    /// A cursor at position 0, the first message ever written.
    pub const fn new() -> Self {
        Self::at(0)
    }

    pub const fn at(position: u64) -> Self {
        Self {
            position,
            overruns: 0,
        }
    }

    /// Position of the next message this cursor will read.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total positions skipped because the writer lapped this reader.
    #[inline]
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Jump straight to the writer's current frontier, dropping whatever is
    /// still unread. Returns the number of positions skipped.
    pub fn catch_up<T: Copy + Send>(&mut self, ring: &RingBuffer<T>) -> u64 {
        let frontier = ring.write_position();
        let skipped = frontier.saturating_sub(self.position);
        if skipped > 0 {
            self.skip_to(frontier);
        }
        skipped
    }

    #[inline(always)]
    pub(crate) fn advance(&mut self) {
        self.position += 1;
    }

    /// Apply the overrun policy against the writer frontier.
    #[inline(always)]
    pub(crate) fn keep_up(&mut self, frontier: u64, capacity: u64) {
        let skipped = apply_overrun_policy(frontier, &mut self.position, capacity, &mut self.overruns);
        if skipped > 0 {
            tracing::trace!(skipped, position = self.position, "reader lapped by writer");
        }
    }

    /// Move forward to `position` (never backwards), counting the skip.
    #[inline]
    pub(crate) fn skip_to(&mut self, position: u64) {
        if position > self.position {
            let skipped = position - self.position;
            self.overruns += skipped;
            self.position = position;
            tracing::trace!(skipped, position, "reader skipped overwritten slots");
        }
    }
}
