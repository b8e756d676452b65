//! Ring configuration: capacity, write strategy, read strategy.
//!
//! Modes can be given either as typed enums through the [`RingConfig`]
//! builder, or as a [`RingFlags`] bitmask (the form used by configuration
//! files). Either way everything is validated here, once, so the hot paths
//! only ever `match` on a known-good pair.

use crate::error::InvalidParam;
use crate::index::mask_for;
use quartz_sync::BackoffPolicy;

bitflags::bitflags! {
    /// Mode selection bitmask.
    ///
    /// Exactly one `WRITE_*` flag may be set (none means `WRITE_LOCK`). The
    /// read flags combine as `READ_ALL|READ_WAIT`, `READ_ALL|READ_BUSY`,
    /// `READ_BUSY`, `READ_SINGLE|READ_WAIT` or `READ_ONCE[|READ_WAIT]`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RingFlags: u32 {
        const WRITE_LOCK   = 1 << 0;
        const WRITE_SINGLE = 1 << 1;
        const WRITE_BUSY   = 1 << 2;

        const READ_ALL     = 1 << 8;
        const READ_WAIT    = 1 << 9;
        const READ_BUSY    = 1 << 10;
        const READ_SINGLE  = 1 << 11;
        const READ_ONCE    = 1 << 12;

        const WRITE_MASK = Self::WRITE_LOCK.bits() | Self::WRITE_SINGLE.bits() | Self::WRITE_BUSY.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Any number of writers, serialized by a mutex.
    #[default]
    Locked,
    /// The caller guarantees a single writing thread.
    SingleWriter,
    /// Any number of writers, lock-free CAS claim with retry.
    BusyRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Broadcast; readers sleep on a futex until a writer publishes.
    #[default]
    WaitBroadcast,
    /// Broadcast; readers spin.
    BusyBroadcast,
    /// Broadcast to a single reader; spins first, then sleeps as the only waiter.
    SingleReader,
    /// Each message is claimed by exactly one reader through a shared cursor.
    CompetingConsumers,
}

impl ReadMode {
    /// True for the modes where every reader owns an independent cursor.
    pub fn is_broadcast(self) -> bool {
        !matches!(self, Self::CompetingConsumers)
    }
}

/// Validated ring configuration.
///
/// The capacity must always be a power of 2, enabling index calculation via
/// bitmasking instead of modulo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    capacity: usize,
    write: WriteMode,
    read: ReadMode,
    backoff: BackoffPolicy,
}

impl RingConfig {
    /// A locked, wait-broadcast ring with the given capacity.
    ///
    /// # Errors
    /// [`InvalidParam::Capacity`] if `capacity` is zero or not a power of two.
    ///
    /// # Example
    /// ```
    /// use quartz_ring::{InvalidParam, ReadMode, RingConfig, WriteMode};
    ///
    /// let cfg = RingConfig::new(1024)?
    ///     .with_write(WriteMode::BusyRetry)
    ///     .with_read(ReadMode::CompetingConsumers);
    /// assert_eq!(cfg.mask(), 1023);
    /// assert_eq!(RingConfig::new(1000), Err(InvalidParam::Capacity(1000)));
    /// # Ok::<(), InvalidParam>(())
    /// ```
    pub fn new(capacity: usize) -> Result<Self, InvalidParam> {
        mask_for(capacity)?;
        Ok(Self {
            capacity,
            write: WriteMode::default(),
            read: ReadMode::default(),
            backoff: BackoffPolicy::default(),
        })
    }

    /// Build a configuration from a flag bitmask.
    ///
    /// # Errors
    /// - [`InvalidParam::Capacity`] for a zero or non-power-of-two capacity
    /// - [`InvalidParam::ConflictingWrite`] when several `WRITE_*` flags are set
    /// - [`InvalidParam::BusyClaim`] for `READ_ONCE | READ_BUSY`
    /// - [`InvalidParam::ConflictingRead`] for other contradictory read flags
    pub fn from_flags(capacity: usize, flags: RingFlags) -> Result<Self, InvalidParam> {
        let cfg = Self::new(capacity)?;
        Ok(cfg
            .with_write(write_mode(flags)?)
            .with_read(read_mode(flags)?))
    }

    pub fn with_write(mut self, write: WriteMode) -> Self {
        self.write = write;
        self
    }

    pub fn with_read(mut self, read: ReadMode) -> Self {
        self.read = read;
        self
    }

    /// Policy used by CAS retries and spinning readers.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the bitmask for index calculation: `seq & mask` equals
    /// `seq % capacity`.
    #[inline(always)]
    pub fn mask(&self) -> u64 {
        (self.capacity as u64) - 1
    }

    #[inline(always)]
    pub fn write_mode(&self) -> WriteMode {
        self.write
    }

    #[inline(always)]
    pub fn read_mode(&self) -> ReadMode {
        self.read
    }

    #[inline(always)]
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }
}

fn write_mode(flags: RingFlags) -> Result<WriteMode, InvalidParam> {
    let write = flags & RingFlags::WRITE_MASK;
    if write.bits().count_ones() > 1 {
        return Err(InvalidParam::ConflictingWrite(flags));
    }
    Ok(if write.contains(RingFlags::WRITE_SINGLE) {
        WriteMode::SingleWriter
    } else if write.contains(RingFlags::WRITE_BUSY) {
        WriteMode::BusyRetry
    } else {
        WriteMode::Locked
    })
}

fn read_mode(flags: RingFlags) -> Result<ReadMode, InvalidParam> {
    let has = |f: RingFlags| flags.contains(f);

    if has(RingFlags::READ_ONCE) {
        if has(RingFlags::READ_BUSY) {
            return Err(InvalidParam::BusyClaim);
        }
        if has(RingFlags::READ_ALL) || has(RingFlags::READ_SINGLE) {
            return Err(InvalidParam::ConflictingRead(flags));
        }
        return Ok(ReadMode::CompetingConsumers);
    }
    if has(RingFlags::READ_BUSY) && has(RingFlags::READ_WAIT) {
        return Err(InvalidParam::ConflictingRead(flags));
    }
    if has(RingFlags::READ_SINGLE) {
        if has(RingFlags::READ_ALL) {
            return Err(InvalidParam::ConflictingRead(flags));
        }
        return Ok(ReadMode::SingleReader);
    }
    if has(RingFlags::READ_BUSY) {
        return Ok(ReadMode::BusyBroadcast);
    }
    Ok(ReadMode::WaitBroadcast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_must_be_a_nonzero_power_of_two() {
        for bad in [0usize, 3, 6, 1000, (1 << 20) + 1] {
            assert_eq!(RingConfig::new(bad), Err(InvalidParam::Capacity(bad)));
        }
        for good in [1usize, 2, 16, 1 << 20] {
            assert_eq!(RingConfig::new(good).unwrap().capacity(), good);
        }
    }

    #[test]
    fn mask_is_capacity_minus_one() {
        assert_eq!(RingConfig::new(8).unwrap().mask(), 0b111);
        assert_eq!(RingConfig::new(1).unwrap().mask(), 0);
    }

    #[test]
    fn write_flags_map_to_modes() {
        let mode = |f| RingConfig::from_flags(8, f).unwrap().write_mode();
        assert_eq!(mode(RingFlags::empty()), WriteMode::Locked);
        assert_eq!(mode(RingFlags::WRITE_LOCK), WriteMode::Locked);
        assert_eq!(mode(RingFlags::WRITE_SINGLE), WriteMode::SingleWriter);
        assert_eq!(mode(RingFlags::WRITE_BUSY), WriteMode::BusyRetry);
    }

    #[test]
    fn read_flags_map_to_modes() {
        let mode = |f| RingConfig::from_flags(8, f).unwrap().read_mode();
        assert_eq!(mode(RingFlags::READ_ALL | RingFlags::READ_WAIT), ReadMode::WaitBroadcast);
        assert_eq!(mode(RingFlags::empty()), ReadMode::WaitBroadcast);
        assert_eq!(mode(RingFlags::READ_BUSY), ReadMode::BusyBroadcast);
        assert_eq!(mode(RingFlags::READ_ALL | RingFlags::READ_BUSY), ReadMode::BusyBroadcast);
        assert_eq!(mode(RingFlags::READ_SINGLE | RingFlags::READ_WAIT), ReadMode::SingleReader);
        assert_eq!(mode(RingFlags::READ_ONCE), ReadMode::CompetingConsumers);
        assert_eq!(mode(RingFlags::READ_ONCE | RingFlags::READ_WAIT), ReadMode::CompetingConsumers);
    }

    #[test]
    fn contradictory_flags_are_rejected() {
        let both_writes = RingFlags::WRITE_LOCK | RingFlags::WRITE_BUSY;
        assert_eq!(
            RingConfig::from_flags(8, both_writes),
            Err(InvalidParam::ConflictingWrite(both_writes))
        );

        let wait_and_spin = RingFlags::READ_ALL | RingFlags::READ_WAIT | RingFlags::READ_BUSY;
        assert_eq!(
            RingConfig::from_flags(8, wait_and_spin),
            Err(InvalidParam::ConflictingRead(wait_and_spin))
        );

        let single_and_all = RingFlags::READ_SINGLE | RingFlags::READ_ALL;
        assert_eq!(
            RingConfig::from_flags(8, single_and_all),
            Err(InvalidParam::ConflictingRead(single_and_all))
        );
    }

    #[test]
    fn capacity_is_checked_before_flags() {
        let flags = RingFlags::READ_ONCE | RingFlags::READ_BUSY;
        assert_eq!(RingConfig::from_flags(12, flags), Err(InvalidParam::Capacity(12)));
    }

    #[test]
    fn flag_names_resolve() {
        assert_eq!(RingFlags::from_name("READ_ONCE"), Some(RingFlags::READ_ONCE));
        assert_eq!(RingFlags::from_name("READ_SOMETIMES"), None);
    }
}
