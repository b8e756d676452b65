use crate::error::ShmError;
use crate::layout::{ShmHeader, bytes_for_ring, header_at, slot_at};
use quartz_mmap::MmapFileMut;
use quartz_ring::Slot;
use quartz_ring::index::{mask_for, slot_index};
use std::marker::PhantomData;
use std::mem::size_of;
use std::path::Path;
use std::ptr;

/// Publishing side of a shared broadcast ring.
///
/// Any number of writers, in any number of processes, may publish into the
/// same file; each publication holds the header's spinlock word for the
/// duration of one slot write.
pub struct ShmWriter<T: Copy> {
    /// Owns the mapping; `base` points into it.
    _mm: MmapFileMut,
    base: *mut u8,
    mask: u64,
    _pd: PhantomData<T>,
}

// SAFETY: all shared state behind `base` is accessed through atomics and the
// header spinlock, and the mapping lives as long as the writer.
unsafe impl<T: Copy + Send> Send for ShmWriter<T> {}
unsafe impl<T: Copy + Send> Sync for ShmWriter<T> {}

impl<T: Copy> ShmWriter<T> {
    /// Create (or truncate) the ring file at `path` and initialize its layout.
    ///
    /// # Errors
    /// [`ShmError::InvalidParam`] for a bad capacity, [`ShmError::Io`] if the
    /// file cannot be created or mapped.
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, ShmError> {
        let mask = mask_for(capacity)?;
        let bytes = bytes_for_ring::<T>(capacity);
        let mut mm = MmapFileMut::create_rw(path.as_ref(), bytes as u64)?;
        let base = mm.as_mut_ptr();

        // SAFETY: the mapping was just created with room for the header and
        // `capacity` slots, and nobody else can have validated it yet.
        unsafe {
            ptr::write(base as *mut ShmHeader, ShmHeader::new::<T>(capacity));
            let slots = base.add(size_of::<ShmHeader>()) as *mut Slot<T>;
            for i in 0..capacity {
                ptr::write(slots.add(i), Slot::new(0));
            }
        }

        tracing::debug!(path = %path.as_ref().display(), capacity, bytes, "shared ring created");
        Ok(Self {
            _mm: mm,
            base,
            mask,
            _pd: PhantomData,
        })
    }

    /// Map an existing ring file as an additional writer.
    ///
    /// # Errors
    /// I/O failures and every header mismatch listed on [`ShmError`].
    pub fn attach<P: AsRef<Path>>(path: P) -> Result<Self, ShmError> {
        let mut mm = MmapFileMut::open_rw(path.as_ref())?;
        let base = mm.as_mut_ptr();
        // SAFETY: page-aligned mapping of `mm.len()` bytes owned by `mm`.
        let header = unsafe { header_at::<T>(base, mm.len())? };
        let capacity = header.capacity;

        tracing::debug!(path = %path.as_ref().display(), capacity, "attached to shared ring");
        Ok(Self {
            _mm: mm,
            base,
            mask: capacity - 1,
            _pd: PhantomData,
        })
    }

    #[inline(always)]
    fn header(&self) -> &ShmHeader {
        // SAFETY: validated (or initialized) in the constructor.
        unsafe { &*(self.base as *const ShmHeader) }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask as usize + 1
    }

    /// Number of positions published so far, by every writer.
    #[inline]
    pub fn write_position(&self) -> u64 {
        self.header().write_cursor.acquire()
    }

    /// Publish `value` to every reader.
    #[inline]
    pub fn publish(&self, value: T) {
        self.publish_msg(Some(value));
    }

    /// Publish the end-of-stream sentinel.
    pub fn close(&self) {
        self.publish_msg(None);
        tracing::debug!(position = self.write_position(), "shared ring closed");
    }

    fn publish_msg(&self, msg: Option<T>) {
        let header = self.header();
        let _guard = header.writer_lock.lock();
        let position = header.write_cursor.relaxed();
        // SAFETY: the index is masked to the validated capacity.
        let slot = unsafe { slot_at::<T>(self.base, slot_index(position, self.mask)) };
        slot.publish(position, msg);
        header.write_cursor.store_release(position + 1);
    }
}
