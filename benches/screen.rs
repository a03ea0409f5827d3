//! Screen benchmarks

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use vtcore::core::{EraseMode, EraseScope, Screen};
use vtcore::search::{HistoryView, SearchEngine};
use vtcore::Terminal;

fn bench_screen_print(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let text: Vec<char> = "Hello, World! ".repeat(100).chars().collect();
    group.throughput(Throughput::Elements(text.len() as u64));

    group.bench_function("print_chars", |b| {
        b.iter(|| {
            let mut screen = Screen::new(80, 24, 1000);
            for &c in &text {
                screen.print(c);
            }
            black_box(screen)
        })
    });

    group.finish();
}

fn bench_screen_scroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    // Scroll well past capacity so eviction is exercised
    let input: String = (0..5000)
        .map(|i| format!("Line {}: Some text content here\r\n", i))
        .collect();
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("scroll_into_history", |b| {
        b.iter(|| {
            let mut terminal = Terminal::new(80, 24, 1000);
            terminal.process(black_box(input.as_bytes()));
            black_box(terminal)
        })
    });

    group.finish();
}

fn bench_screen_csi(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let input = "\x1b[H\x1b[2J\x1b[1;31mHello\x1b[0m\x1b[10;10H\x1b[K".repeat(100);
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("csi_apply", |b| {
        b.iter(|| {
            let mut terminal = Terminal::new(80, 24, 0);
            terminal.process(black_box(input.as_bytes()));
            black_box(terminal)
        })
    });

    group.finish();
}

fn bench_screen_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let mut filled = Terminal::new(80, 24, 0);
    filled.process("Hello, World!\r\n".repeat(20).as_bytes());

    group.bench_function("resize", |b| {
        b.iter_batched(
            || filled.clone(),
            |mut terminal| {
                terminal.resize(40, 12);
                terminal.resize(120, 40);
                terminal.resize(80, 24);
                terminal
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("erase_display", |b| {
        b.iter_batched(
            || filled.screen().clone(),
            |mut screen| {
                screen.erase(EraseScope::Display, EraseMode::All);
                screen
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    let mut terminal = Terminal::new(80, 24, 10000);
    let input: String = (0..10000)
        .map(|i| {
            if i % 97 == 0 {
                format!("error: build step {} failed\r\n", i)
            } else {
                format!("ok: step {}\r\n", i)
            }
        })
        .collect();
    terminal.process(input.as_bytes());

    group.bench_function("regex_find_all_10k", |b| {
        let mut engine = SearchEngine::new();
        engine
            .set_query(r"^error: .* (\d+)", false, true)
            .unwrap();
        b.iter(|| black_box(engine.find_all(&HistoryView::of(terminal.screen()))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_screen_print,
    bench_screen_scroll,
    bench_screen_csi,
    bench_screen_resize,
    bench_search
);

criterion_main!(benches);
