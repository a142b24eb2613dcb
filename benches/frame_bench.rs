//! Criterion benchmark for framing and the shared buffer
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use simplemmf::core::SharedBuffer;
use simplemmf::protocol::{read_frame, write_frame};

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for chars in [16usize, 1024, 64 * 1024].iter() {
        let message = "x".repeat(*chars);
        let mut region = vec![0u8; 4 + chars * 2];

        group.throughput(Throughput::Bytes((chars * 2) as u64));

        group.bench_with_input(BenchmarkId::new("write", chars), &message, |b, message| {
            b.iter(|| write_frame(black_box(&mut region), black_box(message)));
        });

        write_frame(&mut region, &message).unwrap();
        group.bench_with_input(BenchmarkId::new("read", chars), &region, |b, region| {
            b.iter(|| read_frame(black_box(region)));
        });
    }

    group.finish();
}

fn bench_shared_buffer(c: &mut Criterion) {
    let name = format!("simplemmf-bench-{}", std::process::id());
    let mut buffer = SharedBuffer::open_or_create(&name, 1 << 20).unwrap();
    let message = "x".repeat(256);

    let mut group = c.benchmark_group("shared_buffer");
    group.throughput(Throughput::Elements(1));

    group.bench_function("write_read_256", |b| {
        b.iter(|| {
            buffer.write_framed(black_box(&message)).unwrap();
            black_box(buffer.read_framed());
        });
    });

    group.finish();
    simplemmf::remove(&name);
}

criterion_group!(benches, bench_frame, bench_shared_buffer);
criterion_main!(benches);
