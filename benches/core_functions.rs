//! Benchmarks for core shardseq functions.
//!
//! Run with: `cargo bench`
//! View reports in: `target/criterion/report/index.html`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use shardseq_lib::bam_codec::{decode, encode};
use shardseq_lib::shard_key::ShardKeyEncoder;
use shardseq_sam::clipper::{
    hard_clip_low_quality_tails, hard_clip_soft_clipped_bases, hard_clip_to_region, revert_soft_clips,
};
use shardseq_sam::{Read, ReadBuilder};

fn qualities(length: usize) -> Vec<u8> {
    (0..length).map(|i| if i < 5 || i + 5 >= length { 2 } else { 30 }).collect()
}

fn mapped_read(length: usize) -> Read {
    ReadBuilder::new().name("bench_read").mapped(0, 1000, &format!("5S{}M5S", length - 10)).qualities(&qualities(length)).build()
}

/// Benchmark shard key computation for mapped and unmapped reads
fn bench_shard_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard_keys");
    let encoder = ShardKeyEncoder::new();

    let mapped = mapped_read(150);
    group.bench_function("mapped", |b| b.iter(|| black_box(encoder.encode(black_box(&mapped)))));

    for length in [50usize, 150, 300] {
        let bases: String = "ACGT".chars().cycle().take(length).collect();
        let unmapped = ReadBuilder::new().name("bench_read").bases(&bases).build();
        let raw = encode(&unmapped).expect("encodable read");
        let decoded = decode(&raw).expect("decodable record");

        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("unmapped_fields", length), &unmapped, |b, read| {
            b.iter(|| black_box(encoder.encode(black_box(read))));
        });
        group.bench_with_input(BenchmarkId::new("unmapped_raw", length), &decoded, |b, read| {
            b.iter(|| black_box(encoder.encode(black_box(read))));
        });
    }

    group.finish();
}

/// Benchmark the clipping operations used by the clip command
fn bench_clipping(c: &mut Criterion) {
    let mut group = c.benchmark_group("clipping");

    for length in [100usize, 150, 250] {
        let read = mapped_read(length);
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(BenchmarkId::new("low_quality_tails", length), &read, |b, read| {
            b.iter(|| black_box(hard_clip_low_quality_tails(black_box(read), 2)));
        });
        group.bench_with_input(BenchmarkId::new("soft_clipped_bases", length), &read, |b, read| {
            b.iter(|| black_box(hard_clip_soft_clipped_bases(black_box(read))));
        });
        group.bench_with_input(BenchmarkId::new("revert_soft_clips", length), &read, |b, read| {
            b.iter(|| black_box(revert_soft_clips(black_box(read))));
        });
        group.bench_with_input(BenchmarkId::new("to_region", length), &read, |b, read| {
            b.iter(|| black_box(hard_clip_to_region(black_box(read), 1020, 1080)));
        });
    }

    group.finish();
}

/// Benchmark BAM record encoding and decoding
fn bench_record_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_codec");
    let read = mapped_read(150);
    let raw = encode(&read).expect("encodable read");
    group.throughput(Throughput::Bytes(raw.len() as u64));

    group.bench_function("encode", |b| b.iter(|| black_box(encode(black_box(&read)))));
    group.bench_function("decode", |b| b.iter(|| black_box(decode(black_box(&raw)))));

    group.finish();
}

criterion_group!(benches, bench_shard_keys, bench_clipping, bench_record_codec);
criterion_main!(benches);
