// Criterion benchmarks for the dipc-common protocol layer
//
// Run benchmarks with:
//   cargo bench -p dipc-common

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dipc_common::protocol::{decoder::FrameDecoder, envelope, frame, FrameHeader};
use serde_json::json;

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    let small = br#"{"method":"ping","params":{}}"#.to_vec();
    let data: Vec<String> = (0..100).map(|i| format!("item_{}", i)).collect();
    let large = envelope::make_request_body("load", &json!({ "data": data })).to_string();

    group.bench_function("encode_small", |b| {
        b.iter(|| frame::encode(black_box(&FrameHeader::request(1)), black_box(&small)));
    });

    group.bench_function("encode_large", |b| {
        b.iter(|| frame::encode(black_box(&FrameHeader::request(1)), black_box(large.as_bytes())));
    });

    group.finish();
}

fn bench_header_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("header_decode");

    let bytes = frame::encode(&FrameHeader::request(1), br#"{"method":"ping","params":{}}"#);

    group.bench_function("decode_header", |b| {
        b.iter(|| frame::decode_header(black_box(&bytes)));
    });

    group.bench_function("decode_and_validate", |b| {
        b.iter(|| {
            let header = frame::decode_header(black_box(&bytes)).unwrap();
            frame::validate(&header)
        });
    });

    group.finish();
}

fn bench_decoder_feed(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoder_feed");

    let mut stream = Vec::new();
    for id in 1..=16u64 {
        stream.extend_from_slice(&frame::encode(
            &FrameHeader::request(id),
            br#"{"method":"ping","params":{}}"#,
        ));
    }

    group.bench_function("feed_whole_stream", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            decoder.feed(black_box(&stream))
        });
    });

    group.bench_function("feed_chunked", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut count = 0;
            for chunk in stream.chunks(64) {
                count += decoder.feed(black_box(chunk)).len();
            }
            count
        });
    });

    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");

    let request = br#"{"method":"add","params":{"a":1,"b":2}}"#;
    let response = br#"{"ok":true,"data":{"sum":3}}"#;

    group.bench_function("parse_request", |b| {
        b.iter(|| envelope::parse_request_body(black_box(request)));
    });

    group.bench_function("parse_response", |b| {
        b.iter(|| envelope::parse_response_body(black_box(response)));
    });

    group.bench_function("make_request", |b| {
        b.iter(|| envelope::make_request_body(black_box("add"), black_box(&json!({"a": 1, "b": 2}))));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_header_decode,
    bench_decoder_feed,
    bench_envelope,
);
criterion_main!(benches);
