//! Framing and reply aggregation throughput.
//!
//! Run with: cargo bench -p printlink-communication

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use printlink_communication::{LineFramer, ReplyAggregator};

/// A realistic device stream: temperature reports acknowledged one by one
fn device_stream(replies: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    for i in 0..replies {
        stream.extend_from_slice(
            format!("T:{}.0 /210.0 B:60.0 /60.0 @:127 B@:0\r\nok\r\n", 200 + i % 10).as_bytes(),
        );
    }
    stream
}

fn bench_framing(c: &mut Criterion) {
    let stream = device_stream(1000);
    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for chunk_size in [1usize, 7, 64, 4096] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut framer = LineFramer::new();
                    let mut aggregator = ReplyAggregator::new();
                    let mut replies = 0usize;
                    for chunk in stream.chunks(chunk_size) {
                        let lines: Vec<_> = framer.feed(black_box(chunk)).collect();
                        for line in lines {
                            if aggregator.observe(line).is_some() {
                                replies += 1;
                            }
                        }
                    }
                    replies
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_framing);
criterion_main!(benches);
