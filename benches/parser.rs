//! Parser benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use vtcore::parser::Parser;

/// Parse `input` and count the actions without allocating a vector
fn count_actions(input: &[u8]) -> usize {
    let mut parser = Parser::new();
    let mut count = 0;
    parser.parse(input, |action| {
        black_box(action);
        count += 1;
    });
    count
}

fn bench_parse_plain_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    // Plain ASCII text
    let plain_text = "Hello, World! ".repeat(1000);
    group.throughput(Throughput::Bytes(plain_text.len() as u64));

    group.bench_function("plain_text", |b| {
        b.iter(|| count_actions(black_box(plain_text.as_bytes())))
    });

    group.finish();
}

fn bench_parse_csi_sequences(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    // CSI sequences (cursor movement, SGR with colon sub-parameters)
    let csi_heavy = "\x1b[1;31mRed\x1b[0m \x1b[5;10H\x1b[2J\x1b[38:2::10:20:30m".repeat(100);
    group.throughput(Throughput::Bytes(csi_heavy.len() as u64));

    group.bench_function("csi_sequences", |b| {
        b.iter(|| count_actions(black_box(csi_heavy.as_bytes())))
    });

    group.finish();
}

fn bench_parse_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    // Mixed content (typical build output)
    let mixed = "Line 1: \x1b[32mOK\x1b[0m\r\nLine 2: \x1b[31mERROR\x1b[0m\r\n\x1b]0;make\x07".repeat(500);
    group.throughput(Throughput::Bytes(mixed.len() as u64));

    group.bench_function("mixed_content", |b| {
        b.iter(|| count_actions(black_box(mixed.as_bytes())))
    });

    group.finish();
}

fn bench_parse_utf8(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    let utf8 = "Hello, 世界! 🎉 ".repeat(500);
    group.throughput(Throughput::Bytes(utf8.len() as u64));

    group.bench_function("utf8_content", |b| {
        b.iter(|| count_actions(black_box(utf8.as_bytes())))
    });

    group.finish();
}

fn bench_parse_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    // Same stream split at awkward boundaries, as PTY reads deliver it
    let mixed = "\x1b[1;32muser@host\x1b[0m:\x1b[34m~/src\x1b[0m$ ls 日本\r\n".repeat(200);
    group.throughput(Throughput::Bytes(mixed.len() as u64));

    group.bench_function("chunked_7_bytes", |b| {
        b.iter(|| {
            let mut parser = Parser::new();
            let mut count = 0usize;
            for chunk in black_box(mixed.as_bytes()).chunks(7) {
                parser.parse(chunk, |_| count += 1);
            }
            count
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_plain_text,
    bench_parse_csi_sequences,
    bench_parse_mixed,
    bench_parse_utf8,
    bench_parse_chunked
);

criterion_main!(benches);
