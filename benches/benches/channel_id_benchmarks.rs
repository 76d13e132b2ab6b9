use std::hint::black_box;

use channelbus::ChannelId;
use channelbus_error::InvalidIdReason;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_id_parse");
    for id in ["/foo", "/chat/room/42", "/a/b/c/d/e/f/g/h", "/service/**"] {
        group.bench_with_input(BenchmarkId::from_parameter(id), id, |b, id| {
            b.iter(|| ChannelId::parse(black_box(id)).unwrap())
        });
    }
    group.finish();
}

fn bench_parse_invalid(c: &mut Criterion) {
    c.bench_function("channel_id_parse_invalid", |b| {
        b.iter(|| {
            let err = ChannelId::parse(black_box("/foo/*/bar")).unwrap_err();
            assert_eq!(err.reason(), InvalidIdReason::MisplacedWildcard);
        })
    });
}

fn bench_matches(c: &mut Criterion) {
    let candidate = ChannelId::parse("/chat/room/42").unwrap();
    let patterns: Vec<ChannelId> = ["/chat/room/42", "/chat/room/*", "/chat/**", "/**", "/other/*"]
        .into_iter()
        .map(|p| ChannelId::parse(p).unwrap())
        .collect();

    c.bench_function("channel_id_matches", |b| {
        b.iter(|| {
            patterns
                .iter()
                .filter(|p| p.matches(black_box(&candidate)))
                .count()
        })
    });
}

fn bench_wilds(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_id_wilds");
    for id in ["/a", "/a/b/c", "/a/b/c/d/e/f/g/h"] {
        let channel = ChannelId::parse(id).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(id), &channel, |b, channel| {
            b.iter(|| black_box(channel.wilds()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_parse_invalid,
    bench_matches,
    bench_wilds
);
criterion_main!(benches);
