//! Benchmarks for the hunter log parser, ADIF reader and dedup filter.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use pota_adif::{
    adif::{parse_adif, write_adif},
    dedup::DedupFilter,
    parser::{parse_line, parse_log},
};

/// Sample hunter log lines in each layout.
const SAMPLE_LINES: &[&str] = &[
    "2024-05-01 14:30 W1AW K5OHY 20m SSB US-IL 1234 Some State Park",
    "2024-05-01 14:42 N0AX K5OHY 40m (CW) US-CO US-0201 Rocky Mountain National Park",
    "2024-05-01\t15:02\tKD9XYZ\tK5OHY\tN0AX\t40m\tCW\tUS-IN\tUS-5678\tOther Park",
    "2024-05-01 15:10 KD9XYZ K5OHY AB1CD 17m FT8 US-1234 Some State Park",
];

const SAMPLE_BLOCK: &str = "\
2024-05-01 16:00
K5OHY
K5OHY
W1AW 20m (SSB) US-IL US-1234 Some State Park
";

fn session(n: usize) -> String {
    let mut text = String::from("Hunter Log\n");
    for i in 0..n {
        text.push_str(SAMPLE_LINES[i % SAMPLE_LINES.len()]);
        text.push('\n');
        if i % 10 == 0 {
            text.push_str(SAMPLE_BLOCK);
        }
    }
    text
}

fn bench_parse_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_line");

    group.throughput(Throughput::Elements(1));
    group.bench_function("tagged", |b| b.iter(|| parse_line(black_box(SAMPLE_LINES[0]))));
    group.bench_function("single_line", |b| {
        b.iter(|| parse_line(black_box(SAMPLE_LINES[2])))
    });

    group.throughput(Throughput::Elements(SAMPLE_LINES.len() as u64));
    group.bench_function("batch", |b| {
        b.iter(|| {
            for line in SAMPLE_LINES {
                let _ = parse_line(black_box(line));
            }
        })
    });

    group.finish();
}

fn bench_parse_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_log");
    let text = session(200);

    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("session_200", |b| b.iter(|| parse_log(black_box(&text))));

    group.finish();
}

fn bench_adif_and_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("adif_dedup");
    let records = parse_log(&session(200)).records;
    let adif = write_adif(&records);

    group.bench_function("write_adif", |b| b.iter(|| write_adif(black_box(&records))));
    group.bench_function("parse_adif", |b| b.iter(|| parse_adif(black_box(&adif))));

    let known = parse_adif(&adif).records;
    let filter = DedupFilter::default();
    group.bench_function("filter_against_self", |b| {
        b.iter(|| filter.filter(black_box(records.clone()), black_box(&known)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_line,
    bench_parse_log,
    bench_adif_and_dedup
);
criterion_main!(benches);
