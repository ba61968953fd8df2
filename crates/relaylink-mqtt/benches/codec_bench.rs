//! MQTT codec benchmarks
//!
//! Run with: `cargo bench -p relaylink-mqtt --bench codec_bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use relaylink_mqtt::{Packet, PublishPacket, QoS};

fn publish_packet(size: usize) -> Packet {
    Packet::Publish(PublishPacket {
        topic: "testChannel/Topic".to_string(),
        qos: QoS::AtLeastOnce,
        retain: false,
        dup: false,
        packet_id: Some(42),
        payload: vec![0x5A; size],
    })
}

fn bench_publish_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_encode");

    for size in [16, 256, 4096, 65536] {
        let packet = publish_packet(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &packet, |b, packet| {
            b.iter(|| black_box(packet.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_publish_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_decode");

    for size in [16, 256, 4096, 65536] {
        let bytes = publish_packet(size).encode().unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(Packet::decode(black_box(bytes)).unwrap()));
        });
    }

    group.finish();
}

fn bench_control_packets(c: &mut Criterion) {
    let pingreq = Packet::PingReq.encode().unwrap();
    c.bench_function("pingreq_decode", |b| {
        b.iter(|| black_box(Packet::decode(black_box(&pingreq)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_publish_encode,
    bench_publish_decode,
    bench_control_packets
);
criterion_main!(benches);
