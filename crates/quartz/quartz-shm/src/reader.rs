use crate::error::ShmError;
use crate::layout::{ShmHeader, header_at, slot_at};
use quartz_mmap::MmapFile;
use quartz_ring::index::{apply_overrun_policy, slot_index};
use quartz_ring::{Observed, ReadTimeout, TryReadError};
use quartz_sync::{Backoff, BackoffPolicy};
use std::marker::PhantomData;
use std::path::Path;
use std::time::{Duration, Instant};

/// Reading side of a shared broadcast ring.
///
/// Maps the file read-only and keeps its own position; opening more readers
/// costs the writer nothing.
pub struct ShmReader<T: Copy> {
    _mm: MmapFile,
    base: *const u8,
    position: u64,
    mask: u64,
    capacity: u64,
    overruns: u64,
    _pd: PhantomData<T>,
}

// SAFETY: the reader only loads from the mapping it owns.
unsafe impl<T: Copy + Send> Send for ShmReader<T> {}

impl<T: Copy> ShmReader<T> {
    /// Open an existing ring file. The reader starts at the writer's current
    /// frontier and only sees messages published from now on.
    ///
    /// # Errors
    /// I/O failures and every header mismatch listed on [`ShmError`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ShmError> {
        let mm = MmapFile::open_ro(path.as_ref())?;
        let base = mm.as_ptr();
        // SAFETY: page-aligned mapping of `mm.len()` bytes owned by `mm`.
        let header = unsafe { header_at::<T>(base, mm.len())? };
        let capacity = header.capacity;
        let position = header.write_cursor.acquire();

        tracing::debug!(path = %path.as_ref().display(), capacity, position, "shared ring opened");
        Ok(Self {
            _mm: mm,
            base,
            position,
            mask: capacity - 1,
            capacity,
            overruns: 0,
            _pd: PhantomData,
        })
    }

    #[inline(always)]
    fn header(&self) -> &ShmHeader {
        // SAFETY: validated in `open`.
        unsafe { &*(self.base as *const ShmHeader) }
    }

    /// Rewind to the oldest message that can still be in the ring.
    pub fn seek_oldest(&mut self) {
        let frontier = self.header().write_cursor.acquire();
        self.position = frontier.saturating_sub(self.capacity);
    }

    /// Position of the next message this reader will return.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Positions skipped because the writer lapped this reader.
    #[inline]
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Read the next message without waiting. `Ok(None)` is the sentinel; the
    /// reader stays on it.
    ///
    /// # Errors
    /// [`TryReadError::Empty`] when nothing new has been published.
    pub fn try_read(&mut self) -> Result<Option<T>, TryReadError> {
        loop {
            let frontier = self.header().write_cursor.acquire();
            let skipped = apply_overrun_policy(frontier, &mut self.position, self.capacity, &mut self.overruns);
            if skipped > 0 {
                tracing::trace!(skipped, position = self.position, "shared reader lapped");
            }
            if self.position >= frontier {
                return Err(TryReadError::Empty);
            }
            // SAFETY: the index is masked to the validated capacity.
            let slot = unsafe { slot_at::<T>(self.base, slot_index(self.position, self.mask)) };
            match slot.observe(self.position) {
                Observed::Ready(Some(value)) => {
                    self.position += 1;
                    return Ok(Some(value));
                }
                Observed::Ready(None) => return Ok(None),
                Observed::Pending => return Err(TryReadError::Empty),
                Observed::Lapped(newer) => {
                    let resume = newer + 1 - self.capacity;
                    if resume > self.position {
                        self.overruns += resume - self.position;
                        self.position = resume;
                    }
                }
            }
        }
    }

    /// Spin (with backoff) until a message arrives or `timeout` passes.
    ///
    /// # Errors
    /// [`ReadTimeout`] when nothing arrived in time.
    pub fn read_timeout(&mut self, timeout: Duration) -> Result<Option<T>, ReadTimeout> {
        let deadline = Instant::now() + timeout;
        Backoff::spin_until(BackoffPolicy::Exponential, Some(deadline), || self.try_read().ok())
            .ok_or(ReadTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShmWriter;
    use std::path::PathBuf;

    struct TempRing(PathBuf);

    impl TempRing {
        fn new(label: &str) -> Self {
            Self(std::env::temp_dir().join(format!("quartz_shm_{label}_{}", std::process::id())))
        }
    }

    impl Drop for TempRing {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn reader_tail_follows_then_sees_new_messages_and_sentinel() {
        let file = TempRing::new("tail");
        let writer = ShmWriter::<u64>::create(&file.0, 8).unwrap();
        writer.publish(1);

        let mut reader = ShmReader::<u64>::open(&file.0).unwrap();
        assert_eq!(reader.try_read(), Err(TryReadError::Empty));
        writer.publish(2);
        writer.close();
        assert_eq!(reader.try_read(), Ok(Some(2)));
        assert_eq!(reader.try_read(), Ok(None));
        assert_eq!(reader.try_read(), Ok(None));
    }

    #[test]
    fn lapped_reader_counts_overruns() {
        let file = TempRing::new("lapped");
        let writer = ShmWriter::<u64>::create(&file.0, 8).unwrap();
        let mut reader = ShmReader::<u64>::open(&file.0).unwrap();
        for i in 0..30 {
            writer.publish(i);
        }
        assert_eq!(reader.try_read(), Ok(Some(22)));
        assert_eq!(reader.overruns(), 22);
    }

    #[test]
    fn seek_oldest_rewinds_to_surviving_messages() {
        let file = TempRing::new("seek");
        let writer = ShmWriter::<u32>::create(&file.0, 4).unwrap();
        for i in 0..3 {
            writer.publish(i);
        }
        let mut reader = ShmReader::<u32>::open(&file.0).unwrap();
        reader.seek_oldest();
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.try_read(), Ok(Some(0)));
    }

    #[test]
    fn attached_writers_share_one_sequence() {
        let file = TempRing::new("attach");
        let first = ShmWriter::<u64>::create(&file.0, 16).unwrap();
        let second = ShmWriter::<u64>::attach(&file.0).unwrap();
        let mut reader = ShmReader::<u64>::open(&file.0).unwrap();
        first.publish(10);
        second.publish(20);
        assert_eq!(first.write_position(), 2);
        assert_eq!(reader.try_read(), Ok(Some(10)));
        assert_eq!(reader.try_read(), Ok(Some(20)));
    }

    #[test]
    fn open_rejects_foreign_and_mismatched_files() {
        let file = TempRing::new("foreign");
        std::fs::write(&file.0, vec![0u8; 4096]).unwrap();
        assert!(matches!(ShmReader::<u64>::open(&file.0), Err(ShmError::BadMagic(0))));

        let short = TempRing::new("short");
        std::fs::write(&short.0, [1u8; 10]).unwrap();
        assert!(matches!(ShmReader::<u64>::open(&short.0), Err(ShmError::Truncated { len: 10, .. })));

        let typed = TempRing::new("typed");
        let _writer = ShmWriter::<u64>::create(&typed.0, 8).unwrap();
        assert!(matches!(ShmReader::<u16>::open(&typed.0), Err(ShmError::ElementSize { .. })));

        assert!(matches!(
            ShmWriter::<u64>::create(&typed.0, 6),
            Err(ShmError::InvalidParam(quartz_ring::InvalidParam::Capacity(6)))
        ));
    }

    #[test]
    fn read_timeout_expires_on_idle_ring() {
        let file = TempRing::new("idle");
        let _writer = ShmWriter::<u64>::create(&file.0, 8).unwrap();
        let mut reader = ShmReader::<u64>::open(&file.0).unwrap();
        assert_eq!(reader.read_timeout(Duration::from_millis(5)), Err(ReadTimeout));
    }
}
