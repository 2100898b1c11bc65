//! Benchmarks for River append and fetch paths

use std::collections::BTreeMap;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use river::record::encode_records;
use river::store::StreamRegistry;
use river::{Record, SpikeRecord};

fn spikes(count: usize) -> Vec<SpikeRecord> {
    (0..count)
        .map(|i| SpikeRecord::new((i % 32) as i32, (i % 4) as i32, i as i64))
        .collect()
}

fn codec_benchmarks(c: &mut Criterion) {
    let records = spikes(4096);
    let packed = encode_records(&records);

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("encode_4096_spikes", |b| {
        b.iter(|| encode_records(black_box(&records)))
    });
    group.bench_function("decode_4096_spikes", |b| {
        b.iter(|| {
            packed
                .chunks_exact(SpikeRecord::SIZE)
                .map(SpikeRecord::decode)
                .collect::<Vec<_>>()
        })
    });
    group.finish();
}

fn store_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    for batch in [1usize, 64, 4096] {
        let packed = encode_records(&spikes(batch));
        group.throughput(Throughput::Elements(batch as u64));

        group.bench_with_input(BenchmarkId::new("append", batch), &packed, |b, packed| {
            let registry = StreamRegistry::new(4 * 1024 * 1024);
            registry
                .create("bench", Some(SpikeRecord::schema()), BTreeMap::new())
                .unwrap();
            b.iter(|| registry.append("bench", batch as u64, black_box(packed)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("fetch", batch), &packed, |b, packed| {
            let registry = StreamRegistry::new(4 * 1024 * 1024);
            registry
                .create("bench", Some(SpikeRecord::schema()), BTreeMap::new())
                .unwrap();
            registry.append("bench", batch as u64, packed).unwrap();
            b.iter(|| {
                registry
                    .fetch("bench", 0, batch as u64, Instant::now())
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, codec_benchmarks, store_benchmarks);
criterion_main!(benches);
