// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode throughput over a synthetic main-frame stream.

use bbx_decoder::{FrameKind, LogParser};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn unsigned_vb(mut value: u32, out: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            out.push(value as u8);
            return;
        }
        out.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

/// Header plus one keyframe and `frames` one-byte delta frames.
fn build_log(frames: usize) -> Vec<u8> {
    let mut log = Vec::with_capacity(frames * 2 + 256);
    for line in [
        "H Field I name:loopIteration,time",
        "H Field I predictor:0,0",
        "H Field I encoding:1,1",
        "H Field P predictor:6,2",
        "H Field P encoding:9,0",
        "H I interval:32",
        "H P interval:1/1",
    ] {
        log.extend_from_slice(line.as_bytes());
        log.push(b'\n');
    }

    log.push(b'I');
    unsigned_vb(0, &mut log);
    unsigned_vb(1_000_000, &mut log);

    for _ in 0..frames {
        log.push(b'P');
        log.push(0x00); // time delta 0
    }

    log
}

fn bench_decode(c: &mut Criterion) {
    let log = build_log(50_000);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(log.len() as u64));
    group.bench_function("main_frames", |b| {
        b.iter(|| {
            let mut parser = LogParser::new(&log);
            parser.parse_header(None, None).expect("header");

            let mut valid = 0u64;
            let mut sink =
                |ok: bool, _frame: Option<&[i64]>, _kind: FrameKind, _start: usize, _len: usize| {
                    if ok {
                        valid += 1;
                    }
                };
            parser
                .parse_log_data(false, None, None, &mut sink)
                .expect("decode");

            black_box(valid)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
