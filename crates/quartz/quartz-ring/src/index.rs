//! Power-of-two index arithmetic and slow-reader overrun handling.

use crate::error::InvalidParam;

/// Returns `capacity - 1`, or an error when `capacity` is zero or not a
/// power of two.
pub fn mask_for(capacity: usize) -> Result<u64, InvalidParam> {
    if capacity == 0 || !capacity.is_power_of_two() {
        return Err(InvalidParam::Capacity(capacity));
    }
    Ok(capacity as u64 - 1)
}

/// Converts a position to a slot index.
///
/// Because the capacity is a power of 2, `seq & mask` is `seq % capacity`
/// without a division. Positions that differ by a multiple of the capacity
/// alias the same slot.
///
/// With `capacity = 8` (mask = 7 = `0b111`):
/// ```text
/// seq =  0 → 0 & 7 = 0
/// seq =  5 → 5 & 7 = 5
/// seq =  8 → 8 & 7 = 0  (wraps around)
/// seq = 15 → 15 & 7 = 7
/// ```
#[inline(always)]
pub fn slot_index(seq: u64, mask: u64) -> usize {
    (seq & mask) as usize
}

/// Fast-forwards a reader that the writer has lapped.
///
/// If the reader trails `write_seq` by more than `capacity`, the messages in
/// between have been overwritten. The reader jumps to the oldest position that
/// can still be valid (`write_seq - capacity`) and the number of skipped
/// positions is added to `overruns`. Returns the number skipped by this call.
///
/// ```text
/// capacity = 8, write_seq = 20, read_seq = 5
///
/// behind = 20 - 5 = 15 > 8  → overrun
/// skipped = 15 - 8 = 7
/// read_seq = 20 - 8 = 12
/// ```
#[inline(always)]
pub fn apply_overrun_policy(write_seq: u64, read_seq: &mut u64, capacity: u64, overruns: &mut u64) -> u64 {
    // saturating_sub: a reader may legitimately sit ahead of a writer that has
    // claimed but not yet published.
    let behind = write_seq.saturating_sub(*read_seq);
    if behind > capacity {
        let skipped = behind - capacity;
        *overruns += skipped;
        *read_seq = write_seq - capacity;
        return skipped;
    }
    0
}
