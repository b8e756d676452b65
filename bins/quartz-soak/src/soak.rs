//! Producer/consumer soak over one ring.
//!
//! Payloads are `(producer << 48) | seq`, so each consumer can check that the
//! values it sees from any one producer never go backwards, and in
//! competing-consumer mode the union of all consumers can be checked for
//! duplicates and holes.

use quartz_config::WorkloadSettings;
use quartz_ring::{ReadMode, RingBuffer, RingConfig};
use std::thread;
use std::time::{Duration, Instant};

const SEQ_BITS: u32 = 48;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;

fn encode(producer: usize, seq: u64) -> u64 {
    ((producer as u64) << SEQ_BITS) | seq
}

fn decode(value: u64) -> (usize, u64) {
    ((value >> SEQ_BITS) as usize, value & SEQ_MASK)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    /// Forward jumps in a producer's sequence.
    pub gaps: u64,
    /// A producer's sequence going backwards or repeating.
    pub replays: u64,
    pub overruns: u64,
}

#[derive(Debug)]
pub struct Report {
    pub read_mode: ReadMode,
    pub produced: u64,
    pub full_retries: u64,
    pub consumers: Vec<ConsumerStats>,
    /// Competing mode only: messages delivered more than once.
    pub duplicates: u64,
    /// Competing mode only: messages never delivered.
    pub missing: u64,
    pub elapsed: Duration,
}

impl Report {
    /// Replays are a failure in every mode; duplicates and holes only where
    /// delivery is meant to be lossless.
    pub fn passed(&self) -> bool {
        self.consumers.iter().all(|c| c.replays == 0) && self.duplicates == 0 && self.missing == 0
    }

    pub fn log(&self) {
        let received: u64 = self.consumers.iter().map(|c| c.received).sum();
        let secs = self.elapsed.as_secs_f64().max(f64::EPSILON);
        for (id, c) in self.consumers.iter().enumerate() {
            if c.gaps > 0 || c.overruns > 0 {
                tracing::warn!(consumer = id, gaps = c.gaps, overruns = c.overruns, "consumer lost messages");
            }
            if c.replays > 0 {
                tracing::error!(consumer = id, replays = c.replays, "consumer saw replayed messages");
            }
        }
        if self.duplicates > 0 || self.missing > 0 {
            tracing::error!(duplicates = self.duplicates, missing = self.missing, "exactly-once delivery violated");
        }
        tracing::info!(
            mode = ?self.read_mode,
            produced = self.produced,
            received,
            full_retries = self.full_retries,
            elapsed = ?self.elapsed,
            msgs_per_sec = (self.produced as f64 / secs) as u64,
            "soak finished"
        );
    }
}

/// Tracks the last sequence seen from every producer.
struct OrderCheck {
    last: Vec<Option<u64>>,
    stats: ConsumerStats,
    /// Broadcast consumers are expected to see every sequence number.
    expect_contiguous: bool,
}

impl OrderCheck {
    fn new(producers: usize, expect_contiguous: bool) -> Self {
        Self {
            last: vec![None; producers],
            stats: ConsumerStats::default(),
            expect_contiguous,
        }
    }

    fn observe(&mut self, consumer: usize, value: u64) {
        let (producer, seq) = decode(value);
        self.stats.received += 1;
        let Some(last) = self.last.get_mut(producer) else {
            tracing::error!(consumer, value, "payload from unknown producer");
            self.stats.replays += 1;
            return;
        };
        match *last {
            Some(prev) if seq <= prev => {
                tracing::error!(consumer, producer, seq, prev, "sequence went backwards");
                self.stats.replays += 1;
            }
            Some(prev) if self.expect_contiguous && seq > prev + 1 => {
                tracing::debug!(consumer, producer, from = prev + 1, to = seq, "gap");
                self.stats.gaps += 1;
            }
            None if self.expect_contiguous && seq > 0 => {
                tracing::debug!(consumer, producer, from = 0, to = seq, "gap");
                self.stats.gaps += 1;
            }
            _ => {}
        }
        *last = Some(seq.max(last.unwrap_or(0)));
    }
}

pub fn run(config: RingConfig, workload: &WorkloadSettings) -> Report {
    let ring = RingBuffer::<u64>::new(config);
    let read_mode = config.read_mode();
    let broadcast = read_mode.is_broadcast();
    let interval = Duration::from_micros(workload.interval_us);
    let producers = workload.producers;
    let messages = workload.messages;

    tracing::info!(
        capacity = config.capacity(),
        write = ?config.write_mode(),
        read = ?read_mode,
        producers,
        consumers = workload.consumers,
        messages,
        "soak starting"
    );

    let start = Instant::now();
    let (consumers, delivered, full_retries) = thread::scope(|s| {
        let ring = &ring;
        let consumer_handles: Vec<_> = (0..workload.consumers)
            .map(|id| {
                let mut cursor = ring.cursor();
                s.spawn(move || {
                    let mut check = OrderCheck::new(producers, broadcast);
                    let mut values = Vec::new();
                    loop {
                        let next = if broadcast {
                            ring.read(&mut cursor)
                        } else {
                            ring.read_shared()
                        };
                        let Some(value) = next else { break };
                        check.observe(id, value);
                        if !broadcast {
                            values.push(value);
                        }
                    }
                    check.stats.overruns = cursor.overruns();
                    (check.stats, values)
                })
            })
            .collect();

        let producer_handles: Vec<_> = (0..producers)
            .map(|p| {
                s.spawn(move || {
                    let mut retries = 0u64;
                    for seq in 0..messages {
                        let value = encode(p, seq);
                        while !ring.write(value) {
                            retries += 1;
                            thread::yield_now();
                        }
                        if !interval.is_zero() {
                            thread::sleep(interval);
                        }
                    }
                    retries
                })
            })
            .collect();

        let full_retries: u64 = producer_handles.into_iter().map(|h| h.join().unwrap_or(0)).sum();

        // Broadcast readers share one sentinel; claimed sentinels need one each.
        let sentinels = if broadcast { 1 } else { workload.consumers };
        for _ in 0..sentinels {
            while !ring.close() {
                thread::yield_now();
            }
        }

        let mut stats = Vec::with_capacity(workload.consumers);
        let mut delivered = Vec::new();
        for handle in consumer_handles {
            match handle.join() {
                Ok((consumer, values)) => {
                    stats.push(consumer);
                    delivered.extend(values);
                }
                Err(_) => {
                    tracing::error!("consumer thread panicked");
                    stats.push(ConsumerStats {
                        replays: 1,
                        ..ConsumerStats::default()
                    });
                }
            }
        }
        (stats, delivered, full_retries)
    });
    let elapsed = start.elapsed();

    let (duplicates, missing) = if broadcast {
        (0, 0)
    } else {
        tally(&delivered, producers, messages)
    };

    Report {
        read_mode,
        produced: producers as u64 * messages,
        full_retries,
        consumers,
        duplicates,
        missing,
        elapsed,
    }
}

/// Count messages delivered more than once and never delivered.
fn tally(delivered: &[u64], producers: usize, messages: u64) -> (u64, u64) {
    let mut seen = vec![0u8; producers * messages as usize];
    for &value in delivered {
        let (producer, seq) = decode(value);
        if producer < producers && seq < messages {
            let hits = &mut seen[producer * messages as usize + seq as usize];
            *hits = hits.saturating_add(1);
        }
    }
    let duplicates = seen.iter().filter(|&&n| n > 1).count() as u64;
    let missing = seen.iter().filter(|&&n| n == 0).count() as u64;
    (duplicates, missing)
}
