use std::hint::black_box;
use std::mem::{align_of, size_of};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use quartz_perf::*;
use quartz_ring::{Channel, ChannelRead, ChannelWrite, Cursor, ReadMode, RingBuffer, Slot, WriteMode};
use quartz_shm::{ShmHeader, ShmReader, ShmWriter};
use quartz_sync::{CachePadded, Sequence};

const CAPACITY: usize = 1 << 16;
const CROSS_THREAD_EVENTS: usize = 200_000;

#[derive(Debug, Clone, serde::Serialize)]
struct CrossThreadResult {
    mode: String,
    latency_ns: Option<LatencySummary>,
    overruns: u64,
}

fn main() {
    let start = ResourceSnapshot::capture();
    let mut results: Vec<Measurement> = Vec::new();

    print_banner();
    section_memory_layout();
    section_hot_path(&mut results);
    let cross = section_cross_thread();
    section_channel(&mut results);
    section_shm(&mut results);

    let used = ResourceSnapshot::capture().since(&start);
    section_resources(&used);
    save_results(&results, &cross, &used);
}

fn print_banner() {
    let bar = "\u{2550}".repeat(90);
    println!("\n{bar}");
    println!("  QUARTZ RING PERFORMANCE REPORT");
    println!("  single-thread hot paths + cross-thread latency per mode");
    println!("{bar}\n");
    let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(0);
    println!("  Cores:   {cores}");
    println!("  Ring:    {CAPACITY} slots");
}

fn section_memory_layout() {
    section("MEMORY LAYOUT");
    println!("  {:<26} {:>8} {:>8}", "Type", "Size", "Align");
    println!("  {}", "\u{2500}".repeat(46));
    let types: &[(&str, usize, usize)] = &[
        ("Slot<u64>", size_of::<Slot<u64>>(), align_of::<Slot<u64>>()),
        ("Slot<[u64; 4]>", size_of::<Slot<[u64; 4]>>(), align_of::<Slot<[u64; 4]>>()),
        (
            "CachePadded<Sequence>",
            size_of::<CachePadded<Sequence>>(),
            align_of::<CachePadded<Sequence>>(),
        ),
        ("ShmHeader", size_of::<ShmHeader>(), align_of::<ShmHeader>()),
    ];
    for &(name, size, align) in types {
        println!("  {name:<26} {size:>6} B {align:>6} B");
    }
}

fn section_hot_path(results: &mut Vec<Measurement>) {
    section("SINGLE-THREAD HOT PATH (ns/op)");
    table_header("Operation");

    for write in WRITE_MODES {
        for read in READ_MODES {
            let ring = RingBuffer::<u64>::new(ring_config(CAPACITY, write, read));
            let mut cursor = Cursor::new();
            let competing = read == ReadMode::CompetingConsumers;
            let name = format!("write+read {}", mode_label(write, read));
            let m = time_per_op(&name, 500, 1_000, 10, || {
                ring.write(black_box(7));
                if competing {
                    black_box(ring.try_read_shared().ok());
                } else {
                    black_box(ring.try_read(&mut cursor).ok());
                }
            });
            table_row(&m.name, &m.ns_per_op);
            results.push(m);
        }
    }

    let ring = RingBuffer::<u64>::new(ring_config(CAPACITY, WriteMode::SingleWriter, ReadMode::BusyBroadcast));
    let mut cursor = ring.tail_cursor();
    let m = time_per_op("try_read (empty)", 500, 10_000, 10, || {
        black_box(ring.try_read(&mut cursor).ok());
    });
    table_row(&m.name, &m.ns_per_op);
    results.push(m);
}

/// One producer, one consumer; the payload is the send time in ns since a
/// shared origin.
fn cross_thread(write: WriteMode, read: ReadMode) -> CrossThreadResult {
    let ring = Arc::new(RingBuffer::<u64>::new(ring_config(CAPACITY, write, read)));
    let origin = Instant::now();
    let ready = Arc::new(AtomicBool::new(false));

    let consumer = {
        let ring = Arc::clone(&ring);
        let ready = Arc::clone(&ready);
        thread::spawn(move || {
            let mut cursor = ring.cursor();
            let mut samples = Vec::with_capacity(CROSS_THREAD_EVENTS);
            ready.store(true, Ordering::Release);
            loop {
                let next = if read == ReadMode::CompetingConsumers {
                    ring.read_shared()
                } else {
                    ring.read(&mut cursor)
                };
                let Some(sent) = next else { break };
                let now = origin.elapsed().as_nanos() as u64;
                samples.push(now.saturating_sub(sent));
            }
            (samples, cursor.overruns())
        })
    };

    while !ready.load(Ordering::Acquire) {
        std::hint::spin_loop();
    }
    for _ in 0..CROSS_THREAD_EVENTS {
        let stamp = origin.elapsed().as_nanos() as u64;
        while !ring.write(stamp) {
            std::hint::spin_loop();
        }
        // pace below saturation so latency, not queueing, is measured
        let until = Instant::now() + Duration::from_nanos(500);
        while Instant::now() < until {
            std::hint::spin_loop();
        }
    }
    while !ring.close() {
        std::hint::spin_loop();
    }

    let (mut samples, overruns) = consumer.join().unwrap_or_default();
    CrossThreadResult {
        mode: mode_label(write, read),
        latency_ns: LatencySummary::from_samples(&mut samples),
        overruns,
    }
}

fn section_cross_thread() -> Vec<CrossThreadResult> {
    section("CROSS-THREAD LATENCY (write \u{2192} read, ns)");
    table_header("Mode");

    let mut out = Vec::new();
    for write in [WriteMode::SingleWriter, WriteMode::BusyRetry] {
        for read in READ_MODES {
            let r = cross_thread(write, read);
            match &r.latency_ns {
                Some(s) => table_row(&r.mode, s),
                None => println!("  {:<40} no samples", r.mode),
            }
            if r.overruns > 0 {
                println!("  {:<40} {} overruns", "", r.overruns);
            }
            out.push(r);
        }
    }
    out
}

fn section_channel(results: &mut Vec<Measurement>) {
    section("CHANNEL (ns/op)");
    table_header("Operation");
    for (write, read) in [
        (ChannelWrite::Sync, ChannelRead::Sync),
        (ChannelWrite::Mutex, ChannelRead::Mutex),
        (ChannelWrite::Spin, ChannelRead::Busy),
    ] {
        let channel = Channel::new(1024, write, read).expect("power-of-two capacity");
        let m = time_per_op(&format!("send+recv {write:?}/{read:?}"), 500, 1_000, 10, || {
            let _ = channel.try_send(black_box(7u64));
            black_box(channel.try_recv().ok());
        });
        table_row(&m.name, &m.ns_per_op);
        results.push(m);
    }
}

fn section_shm(results: &mut Vec<Measurement>) {
    section("SHARED-MEMORY RING (ns/op)");
    table_header("Operation");
    let path = temp_shm_path("report");
    let (writer, mut reader) = match ShmWriter::<u64>::create(&path, CAPACITY)
        .and_then(|w| ShmReader::<u64>::open(&path).map(|r| (w, r)))
    {
        Ok(pair) => pair,
        Err(e) => {
            println!("  skipped: {e}");
            return;
        }
    };
    let m = time_per_op("publish+try_read", 500, 1_000, 10, || {
        writer.publish(black_box(7));
        black_box(reader.try_read().ok());
    });
    table_row(&m.name, &m.ns_per_op);
    results.push(m);
    drop(writer);
    drop(reader);
    let _ = std::fs::remove_file(&path);
}

fn section_resources(used: &ResourceSnapshot) {
    section("RESOURCE USAGE");
    println!("  Max RSS:              {} KB", used.max_rss_kb);
    println!("  Minor faults:         {}", used.minor_faults);
    println!(
        "  Context switches:     {} voluntary, {} involuntary",
        used.voluntary_switches, used.involuntary_switches
    );
    println!("  CPU time:             {} us user, {} us sys", used.user_us, used.system_us);
}

fn save_results(results: &[Measurement], cross: &[CrossThreadResult], used: &ResourceSnapshot) {
    let results_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/results");
    let _ = std::fs::create_dir_all(results_dir);
    let json_path = format!("{results_dir}/{}_report.json", std::process::id());

    let output = serde_json::json!({
        "report_type": "ring",
        "capacity": CAPACITY,
        "hot_path": results,
        "cross_thread": cross,
        "resources": used,
    });

    let written = serde_json::to_string_pretty(&output)
        .map_err(std::io::Error::other)
        .and_then(|json| std::fs::write(&json_path, json));
    match written {
        Ok(()) => println!("\n  Results saved to: {json_path}\n"),
        Err(e) => eprintln!("failed to write {json_path}: {e}"),
    }
}
