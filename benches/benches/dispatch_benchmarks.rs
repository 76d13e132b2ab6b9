use std::hint::black_box;

use channelbus::{BusServer, Message, QueueSession};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

/// Сервер с `subscribers` сессиями на `/chat/room` и ещё одной на `/chat/**`.
fn server_with_subscribers(subscribers: usize) -> (BusServer, Vec<std::sync::Arc<QueueSession>>) {
    let server = BusServer::default();
    let (room, _) = server.create_channel_if_absent("/chat/room", &[]).unwrap();
    let (wild, _) = server.create_channel_if_absent("/chat/**", &[]).unwrap();

    let mut sessions = Vec::with_capacity(subscribers + 1);
    for _ in 0..subscribers {
        let session = QueueSession::new();
        server.subscribe(&session.handle(), &room);
        sessions.push(session);
    }
    let watcher = QueueSession::new();
    server.subscribe(&watcher.handle(), &wild);
    sessions.push(watcher);

    (server, sessions)
}

fn bench_publish_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fan_out");
    for subscribers in [0usize, 1, 10, 100] {
        let (server, sessions) = server_with_subscribers(subscribers);
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    let outcome = server
                        .publish_to(None, "/chat/room", black_box(Message::new(json!({"text": "hi"}))))
                        .unwrap();
                    for session in &sessions {
                        session.drain();
                    }
                    outcome
                })
            },
        );
    }
    group.finish();
}

fn bench_publish_absent(c: &mut Criterion) {
    let server = BusServer::default();
    c.bench_function("publish_absent_channel", |b| {
        b.iter(|| {
            server
                .publish_to(None, black_box("/nobody/listens"), Message::new(1))
                .unwrap()
        })
    });
}

fn bench_sweep(c: &mut Criterion) {
    let server = BusServer::default();
    for i in 0..1000 {
        let (channel, _) = server
            .create_channel_if_absent(&format!("/bench/{i}"), &[])
            .unwrap();
        channel.set_persistent(true);
    }
    c.bench_function("sweep_1000_persistent", |b| b.iter(|| black_box(server.sweep())));
}

criterion_group!(
    benches,
    bench_publish_fan_out,
    bench_publish_absent,
    bench_sweep
);
criterion_main!(benches);
