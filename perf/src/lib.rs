//! Helpers shared by the `perf_report` binary and the criterion benches.

use quartz_ring::{ReadMode, RingConfig, WriteMode};
use std::time::Instant;

// ─── Latency summaries ──────────────────────────────────────────────────────

/// Nearest-rank percentiles of a set of nanosecond samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
}

impl LatencySummary {
    /// Sorts `samples` in place. `None` when there is nothing to summarize.
    pub fn from_samples(samples: &mut [u64]) -> Option<Self> {
        samples.sort_unstable();
        let (&min, &max) = (samples.first()?, samples.last()?);
        let rank = |pct: f64| {
            let nth = (pct / 100.0 * samples.len() as f64).ceil() as usize;
            samples[nth.clamp(1, samples.len()) - 1]
        };
        Some(Self {
            count: samples.len(),
            min,
            p50: rank(50.0),
            p90: rank(90.0),
            p99: rank(99.0),
            p999: rank(99.9),
            max,
        })
    }
}

/// A named per-operation cost.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Measurement {
    pub name: String,
    pub ns_per_op: LatencySummary,
}

/// Run `op` in `batches` timed batches of `batch_size` calls after a warmup
/// of `warmup` batches. Each batch contributes one ns/op sample.
pub fn time_per_op(name: &str, batches: usize, batch_size: usize, warmup: usize, mut op: impl FnMut()) -> Measurement {
    let batch_size = batch_size.max(1);
    (0..warmup * batch_size).for_each(|_| op());

    let mut samples: Vec<u64> = (0..batches.max(1))
        .map(|_| {
            let start = Instant::now();
            (0..batch_size).for_each(|_| op());
            (start.elapsed().as_nanos() / batch_size as u128).max(1) as u64
        })
        .collect();

    Measurement {
        name: name.to_owned(),
        ns_per_op: LatencySummary::from_samples(&mut samples).unwrap_or_default(),
    }
}

// ─── Mode matrix ────────────────────────────────────────────────────────────

pub const WRITE_MODES: [WriteMode; 3] = [WriteMode::Locked, WriteMode::SingleWriter, WriteMode::BusyRetry];

pub const READ_MODES: [ReadMode; 4] = [
    ReadMode::WaitBroadcast,
    ReadMode::BusyBroadcast,
    ReadMode::SingleReader,
    ReadMode::CompetingConsumers,
];

pub fn ring_config(capacity: usize, write: WriteMode, read: ReadMode) -> RingConfig {
    RingConfig::new(capacity)
        .expect("bench capacities are powers of two")
        .with_write(write)
        .with_read(read)
}

pub fn mode_label(write: WriteMode, read: ReadMode) -> String {
    format!("{write:?}/{read:?}")
}

pub fn temp_shm_path(label: &str) -> String {
    format!("/tmp/quartz_bench_{label}_{}", std::process::id())
}

// ─── Process resources ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ResourceSnapshot {
    pub max_rss_kb: i64,
    pub minor_faults: i64,
    pub voluntary_switches: i64,
    pub involuntary_switches: i64,
    pub user_us: i64,
    pub system_us: i64,
}

impl ResourceSnapshot {
    pub fn capture() -> Self {
        // SAFETY: rusage is plain data and getrusage only writes into it.
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
        if rc != 0 {
            return Self::default();
        }
        let micros = |tv: libc::timeval| tv.tv_sec as i64 * 1_000_000 + tv.tv_usec as i64;
        Self {
            // kilobytes on Linux, bytes on macOS
            max_rss_kb: if cfg!(target_os = "linux") {
                usage.ru_maxrss as i64
            } else {
                usage.ru_maxrss as i64 / 1024
            },
            minor_faults: usage.ru_minflt as i64,
            voluntary_switches: usage.ru_nvcsw as i64,
            involuntary_switches: usage.ru_nivcsw as i64,
            user_us: micros(usage.ru_utime),
            system_us: micros(usage.ru_stime),
        }
    }

    /// Counters accumulated since `start`. Peak RSS is kept as-is.
    pub fn since(&self, start: &Self) -> Self {
        Self {
            max_rss_kb: self.max_rss_kb,
            minor_faults: self.minor_faults - start.minor_faults,
            voluntary_switches: self.voluntary_switches - start.voluntary_switches,
            involuntary_switches: self.involuntary_switches - start.involuntary_switches,
            user_us: self.user_us - start.user_us,
            system_us: self.system_us - start.system_us,
        }
    }
}

// ─── Table output ───────────────────────────────────────────────────────────

pub fn section(title: &str) {
    let rule = "─".repeat(90);
    println!("\n{rule}\n  {title}\n{rule}\n");
}

pub fn table_header(first: &str) {
    println!(
        "  {first:<40} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "min", "p50", "p90", "p99", "p99.9", "max"
    );
    println!("  {}", "─".repeat(94));
}

pub fn table_row(name: &str, s: &LatencySummary) {
    println!(
        "  {name:<40} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        s.min, s.p50, s.p90, s.p99, s.p999, s.max
    );
}
