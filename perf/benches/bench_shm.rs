use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use quartz_perf::temp_shm_path;
use quartz_shm::{ShmReader, ShmWriter};

fn bench_publish(c: &mut Criterion) {
    let path = temp_shm_path("crit_pub");
    let writer = ShmWriter::<u64>::create(&path, 65536).expect("failed to create writer");

    let mut group = c.benchmark_group("shm");
    group.throughput(Throughput::Elements(1));
    group.bench_function("publish", |b| {
        b.iter(|| writer.publish(black_box(42)));
    });

    drop(group);
    drop(writer);
    let _ = std::fs::remove_file(&path);
}

fn bench_try_read_empty(c: &mut Criterion) {
    let path = temp_shm_path("crit_empty");
    let writer = ShmWriter::<u64>::create(&path, 65536).expect("failed to create writer");
    let mut reader = ShmReader::<u64>::open(&path).expect("failed to open reader");

    let mut group = c.benchmark_group("shm");
    group.throughput(Throughput::Elements(1));
    group.bench_function("try_read (empty)", |b| {
        b.iter(|| black_box(reader.try_read()));
    });

    drop(group);
    drop(writer);
    drop(reader);
    let _ = std::fs::remove_file(&path);
}

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("shm_capacity");
    group.throughput(Throughput::Elements(1));

    for &cap in &[1024usize, 16384, 65536] {
        let path = temp_shm_path(&format!("crit_cap_{cap}"));
        let writer = ShmWriter::<[u64; 4]>::create(&path, cap).expect("failed to create writer");
        let mut reader = ShmReader::<[u64; 4]>::open(&path).expect("failed to open reader");

        group.bench_function(format!("round_trip_cap_{cap}"), |b| {
            b.iter(|| {
                writer.publish(black_box([1, 2, 3, 4]));
                black_box(reader.try_read())
            });
        });

        drop(writer);
        drop(reader);
        let _ = std::fs::remove_file(&path);
    }

    group.finish();
}

criterion_group!(benches, bench_publish, bench_try_read_empty, bench_round_trip);
criterion_main!(benches);
