//! Competing consumers: with many producers and consumers every message is
//! delivered to exactly one consumer.

use quartz_ring::{RingBuffer, RingFlags};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

const CONSUMERS: usize = 4;
const PER_PRODUCER: u64 = 5_000;

fn write_retrying(ring: &RingBuffer<u64>, value: u64) {
    while !ring.write(value) {
        thread::yield_now();
    }
}

fn close_retrying(ring: &RingBuffer<u64>) {
    while !ring.close() {
        thread::yield_now();
    }
}

fn run(capacity: usize, write: RingFlags, producers: u64) {
    let ring = RingBuffer::<u64>::with_flags(capacity, write | RingFlags::READ_ONCE).unwrap();

    let delivered: Vec<u64> = thread::scope(|s| {
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                s.spawn(|| {
                    let mut got = Vec::new();
                    while let Some(v) = ring.read_shared() {
                        got.push(v);
                    }
                    got
                })
            })
            .collect();

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let ring = &ring;
                s.spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        write_retrying(ring, (p << 48) | seq);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // one sentinel per consumer
        for _ in 0..CONSUMERS {
            close_retrying(&ring);
        }

        consumers.into_iter().flat_map(|c| c.join().unwrap()).collect()
    });

    let unique: HashSet<u64> = delivered.iter().copied().collect();
    assert_eq!(unique.len(), delivered.len(), "{write:?} x{capacity}: duplicate delivery");
    let expected: HashSet<u64> = (0..producers)
        .flat_map(|p| (0..PER_PRODUCER).map(move |seq| (p << 48) | seq))
        .collect();
    assert_eq!(unique, expected, "{write:?} x{capacity}: missing messages");

    assert_eq!(ring.try_read_shared(), Err(quartz_ring::TryReadError::Empty));
}

#[test]
fn locked_writers() {
    run(64, RingFlags::WRITE_LOCK, 4);
}

#[test]
fn busy_retry_writers() {
    run(64, RingFlags::WRITE_BUSY, 4);
}

#[test]
fn single_writer() {
    run(64, RingFlags::WRITE_SINGLE, 1);
}

#[test]
fn one_slot_ring_with_locked_writers() {
    run(1, RingFlags::WRITE_LOCK, 2);
}

#[test]
fn one_slot_ring_with_busy_retry_writers() {
    run(1, RingFlags::WRITE_BUSY, 2);
}

#[test]
fn one_slot_ring_with_single_writer() {
    run(1, RingFlags::WRITE_SINGLE, 1);
}

#[test]
fn sleeping_consumer_is_woken_by_a_write() {
    let ring = RingBuffer::<u64>::with_flags(8, RingFlags::READ_ONCE | RingFlags::READ_WAIT).unwrap();
    thread::scope(|s| {
        let consumer = s.spawn(|| ring.read_shared_timeout(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        assert!(ring.write(42));
        assert_eq!(consumer.join().unwrap(), Ok(Some(42)));
    });
}
