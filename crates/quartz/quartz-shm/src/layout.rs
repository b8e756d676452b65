//! Binary layout of a shared ring file.
//!
//! ```text
//! offset 0    ┌──────────────────────────────────────────────────────┐
//!             │ magic │ version │ capacity │ elem_size │ (reserved)   │
//! offset 64   ├──────────────────────────────────────────────────────┤
//!             │ write_cursor: next position to publish (atomic u64)  │
//! offset 128  ├──────────────────────────────────────────────────────┤
//!             │ writer_lock: spinlock word shared by all writers     │
//! offset 192  ├──────────────────────────────────────────────────────┤
//!             │ Slot<T>[0]   stamp │ payload                         │
//!             │ Slot<T>[1]                                           │
//!             │ ...                                                  │
//!             │ Slot<T>[capacity - 1]                                │
//!             └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every region starts on its own cache line. The identity fields are written
//! once by the creator before any other process can open the file.

use crate::error::ShmError;
use quartz_ring::Slot;
use quartz_sync::{CachePadded, Sequence, SpinLock};
use std::mem::{offset_of, size_of};

/// "QUARTZRB" in ASCII.
pub const SHM_MAGIC: u64 = 0x5155_4152_545A_5242;

/// Bump on any incompatible layout change.
pub const SHM_VERSION: u64 = 1;

#[repr(C)]
pub struct ShmHeader {
    pub magic: u64,
    pub version: u64,
    pub capacity: u64,
    /// `size_of::<T>()` of the payload type, checked on open.
    pub elem_size: u64,
    _reserved: [u64; 4],
    pub write_cursor: CachePadded<Sequence>,
    pub writer_lock: CachePadded<SpinLock>,
}

const _: () = {
    assert!(offset_of!(ShmHeader, write_cursor) == 64);
    assert!(offset_of!(ShmHeader, writer_lock) == 128);
    assert!(size_of::<ShmHeader>() == 192);
};

impl ShmHeader {
    pub(crate) fn new<T>(capacity: usize) -> Self {
        Self {
            magic: SHM_MAGIC,
            version: SHM_VERSION,
            capacity: capacity as u64,
            elem_size: size_of::<T>() as u64,
            _reserved: [0; 4],
            write_cursor: CachePadded::new(Sequence::new(0)),
            writer_lock: CachePadded::new(SpinLock::new()),
        }
    }

    /// Check that this header describes a ring of `T` that fits in `len`
    /// mapped bytes.
    pub fn validate<T: Copy>(&self, len: usize) -> Result<(), ShmError> {
        if self.magic != SHM_MAGIC {
            return Err(ShmError::BadMagic(self.magic));
        }
        if self.version != SHM_VERSION {
            return Err(ShmError::Version {
                found: self.version,
                expected: SHM_VERSION,
            });
        }
        if self.capacity == 0 || !self.capacity.is_power_of_two() {
            return Err(ShmError::Capacity(self.capacity));
        }
        if self.elem_size != size_of::<T>() as u64 {
            return Err(ShmError::ElementSize {
                found: self.elem_size,
                expected: size_of::<T>() as u64,
            });
        }
        let needed = bytes_for_ring::<T>(self.capacity as usize);
        if len < needed {
            return Err(ShmError::Truncated { len, needed });
        }
        Ok(())
    }
}

/// Total bytes for a header plus `capacity` slots of `T`.
pub fn bytes_for_ring<T: Copy>(capacity: usize) -> usize {
    size_of::<ShmHeader>() + capacity * size_of::<Slot<T>>()
}

/// Validate the mapping at `base` and return its header.
///
/// # Safety
/// `base` must point to at least `len` readable bytes, aligned to 64, that
/// stay mapped for `'a`.
pub(crate) unsafe fn header_at<'a, T: Copy>(base: *const u8, len: usize) -> Result<&'a ShmHeader, ShmError> {
    if len < size_of::<ShmHeader>() {
        return Err(ShmError::Truncated {
            len,
            needed: size_of::<ShmHeader>(),
        });
    }
    // SAFETY: at least a header's worth of aligned bytes, per the caller.
    let header = unsafe { &*(base as *const ShmHeader) };
    header.validate::<T>(len)?;
    Ok(header)
}

/// # Safety
/// `base` must point to a validated layout and `index < capacity`.
#[inline(always)]
pub(crate) unsafe fn slot_at<'a, T: Copy>(base: *const u8, index: usize) -> &'a Slot<T> {
    // SAFETY: in bounds per the caller; slots start on a cache line after the header.
    unsafe {
        let slots = base.add(size_of::<ShmHeader>()) as *const Slot<T>;
        &*slots.add(index)
    }
}
