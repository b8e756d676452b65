//! One writer, one reader: every mode pair delivers in order.
//!
//! Broadcast rings are sized larger than the message count so no reader can
//! be lapped; loss under lapping is covered in `lapping.rs`.

use quartz_ring::{Cursor, ReadMode, RingBuffer, RingConfig, WriteMode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

const COUNT: u64 = 5_000;

const WRITE_MODES: [WriteMode; 3] = [WriteMode::Locked, WriteMode::SingleWriter, WriteMode::BusyRetry];
const BROADCAST_MODES: [ReadMode; 3] = [ReadMode::WaitBroadcast, ReadMode::BusyBroadcast, ReadMode::SingleReader];

fn ring(capacity: usize, write: WriteMode, read: ReadMode) -> Arc<RingBuffer<u64>> {
    let cfg = RingConfig::new(capacity).unwrap().with_write(write).with_read(read);
    Arc::new(RingBuffer::new(cfg))
}

#[test]
fn broadcast_single_reader_sees_every_value_in_order() {
    for write in WRITE_MODES {
        for read in BROADCAST_MODES {
            let ring = ring(8192, write, read);
            let reader = {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    let mut cursor = ring.cursor();
                    let mut seen = Vec::with_capacity(COUNT as usize);
                    while let Some(v) = ring.read(&mut cursor) {
                        seen.push(v);
                    }
                    (seen, cursor)
                })
            };
            for i in 0..COUNT {
                assert!(ring.write(i));
            }
            assert!(ring.close());

            let (seen, cursor) = reader.join().unwrap();
            assert_eq!(seen, (0..COUNT).collect::<Vec<_>>(), "{write:?}/{read:?}");
            assert_eq!(cursor.overruns(), 0);
            assert_eq!(cursor.position(), COUNT, "cursor parks on the sentinel");
        }
    }
}

#[test]
fn competing_consumer_pair_is_lossless_under_backpressure() {
    for write in WRITE_MODES {
        let ring = ring(16, write, ReadMode::CompetingConsumers);
        let reader = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut seen = Vec::with_capacity(COUNT as usize);
                while let Some(v) = ring.read_shared() {
                    seen.push(v);
                }
                seen
            })
        };
        for i in 0..COUNT {
            while !ring.write(i) {
                thread::yield_now();
            }
        }
        while !ring.close() {
            thread::yield_now();
        }
        assert_eq!(reader.join().unwrap(), (0..COUNT).collect::<Vec<_>>(), "{write:?}");
        assert_eq!(ring.read_position(), Some(COUNT + 1));
    }
}

/// Capacity 16, locked writer, busy broadcast reader starting at position 0:
/// 0..159 come back in order followed by the sentinel. The writer is paced by
/// the caller so it never gets a full lap ahead.
#[test]
fn small_ring_paced_writer_round_trip() {
    const CAPACITY: u64 = 16;
    const VALUES: u64 = 160;

    let ring = ring(CAPACITY as usize, WriteMode::Locked, ReadMode::BusyBroadcast);
    let consumed = Arc::new(AtomicU64::new(0));

    let reader = {
        let ring = Arc::clone(&ring);
        let consumed = Arc::clone(&consumed);
        thread::spawn(move || {
            let mut cursor = Cursor::new();
            let mut seen = Vec::new();
            while let Some(v) = ring.read(&mut cursor) {
                seen.push(v);
                consumed.store(seen.len() as u64, Ordering::Release);
            }
            // the sentinel is sticky
            assert_eq!(ring.try_read(&mut cursor), Ok(None));
            seen
        })
    };

    for i in 0..VALUES {
        while i - consumed.load(Ordering::Acquire) >= CAPACITY - 1 {
            thread::yield_now();
        }
        assert!(ring.write(i));
    }
    ring.close();

    assert_eq!(reader.join().unwrap(), (0..VALUES).collect::<Vec<_>>());
}
