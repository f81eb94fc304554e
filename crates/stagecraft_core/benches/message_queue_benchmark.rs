//! # Message Queue Benchmark
//!
//! Throughput of reserving, flushing and draining closure messages once the
//! buffers have warmed up.
//!
//! Run with: `cargo bench --package stagecraft_core --bench message_queue_benchmark`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stagecraft_core::{message_queue, BufferIndex, MessageBuffer, QueueConfig};

/// Reserve then drain one buffer, no threads involved.
fn bench_buffer_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_buffer_round");

    for count in [100_u64, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut buffer = MessageBuffer::<u64>::with_capacity_bytes(4096);
            let mut total = 0_u64;
            b.iter(|| {
                for i in 0..count {
                    buffer.reserve(move |t: &mut u64, _: BufferIndex| *t += i);
                }
                black_box(buffer.process_all(&mut total, BufferIndex::ZERO))
            });
        });
    }
    group.finish();
}

/// Full producer -> consumer cycle with buffer recycling.
fn bench_queue_frame(c: &mut Criterion) {
    let (mut producer, mut consumer) = message_queue::<[f32; 4]>(QueueConfig::default());
    let mut state = [0.0_f32; 4];

    c.bench_function("message_queue_frame_1k", |b| {
        b.iter(|| {
            for i in 0..1_000_u16 {
                let value = f32::from(i);
                producer.reserve_message(
                    move |s: &mut [f32; 4], _: BufferIndex| s[usize::from(i % 4)] = value,
                    i % 2 == 0,
                );
            }
            producer.flush();
            black_box(consumer.process_messages(&mut state, BufferIndex::ZERO))
        });
    });
}

criterion_group!(benches, bench_buffer_round, bench_queue_frame);
criterion_main!(benches);
