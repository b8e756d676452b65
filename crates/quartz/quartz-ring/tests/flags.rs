//! Construction-time validation of capacity and mode flags.

use proptest::prelude::*;
use quartz_ring::{InvalidParam, ReadMode, RingBuffer, RingConfig, RingFlags, WriteMode};

fn documented_combinations() -> Vec<(RingFlags, WriteMode, ReadMode)> {
    let writes = [
        (RingFlags::empty(), WriteMode::Locked),
        (RingFlags::WRITE_LOCK, WriteMode::Locked),
        (RingFlags::WRITE_SINGLE, WriteMode::SingleWriter),
        (RingFlags::WRITE_BUSY, WriteMode::BusyRetry),
    ];
    let reads = [
        (RingFlags::READ_ALL | RingFlags::READ_WAIT, ReadMode::WaitBroadcast),
        (RingFlags::READ_ALL | RingFlags::READ_BUSY, ReadMode::BusyBroadcast),
        (RingFlags::READ_BUSY, ReadMode::BusyBroadcast),
        (RingFlags::READ_SINGLE | RingFlags::READ_WAIT, ReadMode::SingleReader),
        (RingFlags::READ_ONCE, ReadMode::CompetingConsumers),
        (RingFlags::READ_ONCE | RingFlags::READ_WAIT, ReadMode::CompetingConsumers),
    ];
    writes
        .iter()
        .flat_map(|&(wf, wm)| reads.iter().map(move |&(rf, rm)| (wf | rf, wm, rm)))
        .collect()
}

#[test]
fn all_documented_combinations_construct() {
    for (flags, write, read) in documented_combinations() {
        let ring = RingBuffer::<u32>::with_flags(32, flags).unwrap();
        assert_eq!(ring.modes(), (write, read), "{flags:?}");
        assert_eq!(ring.capacity(), 32);
    }
}

#[test]
fn busy_claim_is_rejected_for_every_capacity() {
    let flags = RingFlags::READ_ONCE | RingFlags::READ_BUSY;
    for shift in 0..20 {
        assert_eq!(
            RingConfig::from_flags(1 << shift, flags),
            Err(InvalidParam::BusyClaim),
            "capacity {}",
            1 << shift
        );
    }
}

#[test]
fn invalid_parameters_have_readable_messages() {
    assert_eq!(
        InvalidParam::Capacity(10).to_string(),
        "capacity 10 is not a non-zero power of two"
    );
    assert!(InvalidParam::BusyClaim.to_string().contains("READ_BUSY"));
}

proptest! {
    #[test]
    fn two_write_flags_never_construct(shift in 0u32..16, a in 0usize..3, b in 0usize..3) {
        prop_assume!(a != b);
        let pick = [RingFlags::WRITE_LOCK, RingFlags::WRITE_SINGLE, RingFlags::WRITE_BUSY];
        let flags = pick[a] | pick[b] | RingFlags::READ_ALL;
        prop_assert_eq!(
            RingConfig::from_flags(1 << shift, flags),
            Err(InvalidParam::ConflictingWrite(flags))
        );
    }

    #[test]
    fn bad_capacity_wins_over_any_flags(capacity in 0usize..1 << 16, bits in any::<u32>()) {
        prop_assume!(!capacity.is_power_of_two());
        let flags = RingFlags::from_bits_truncate(bits);
        prop_assert_eq!(RingConfig::from_flags(capacity, flags), Err(InvalidParam::Capacity(capacity)));
    }

    #[test]
    fn any_flag_set_either_validates_or_errors(shift in 0u32..12, bits in any::<u32>()) {
        let flags = RingFlags::from_bits_truncate(bits);
        match RingConfig::from_flags(1 << shift, flags) {
            Ok(cfg) => {
                prop_assert_eq!(cfg.capacity(), 1 << shift);
                prop_assert!((flags & RingFlags::WRITE_MASK).bits().count_ones() <= 1);
            }
            Err(InvalidParam::Capacity(_)) => prop_assert!(false, "capacity was valid"),
            Err(_) => {}
        }
    }
}
