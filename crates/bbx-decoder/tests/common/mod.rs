// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synthetic log construction for the end-to-end tests.

use bbx_decoder::{FrameKind, FrameSink};
use byteorder::{LittleEndian, WriteBytesExt};

/// Builds a log byte stream: header lines followed by hand-encoded frames.
#[derive(Default)]
pub struct LogBuilder {
    bytes: Vec<u8>,
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `H <line>\n` header line.
    pub fn header_line(mut self, line: &str) -> Self {
        self.bytes.extend_from_slice(b"H ");
        self.bytes.extend_from_slice(line.as_bytes());
        self.bytes.push(b'\n');
        self
    }

    /// Append a frame: its tag byte plus a pre-encoded payload.
    pub fn frame(mut self, tag: u8, payload: &[u8]) -> Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(payload);
        self
    }

    /// Append raw bytes (junk injection, truncated tails).
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Variable-byte unsigned encoding (7 data bits per byte, bit 7 continues).
pub fn unsigned_vb(mut value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        if value < 0x80 {
            out.push(value as u8);
            return out;
        }
        out.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

/// ZigZag signed variable-byte encoding.
pub fn signed_vb(value: i32) -> Vec<u8> {
    unsigned_vb(((value << 1) ^ (value >> 31)) as u32)
}

/// Little-endian 16-bit write.
pub fn s16(value: i16) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_i16::<LittleEndian>(value).expect("vec write");
    out
}

/// Concatenate encoded field payloads into one frame payload.
pub fn payload(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.iter().flatten().copied().collect()
}

/// One observed frame completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenFrame {
    pub valid: bool,
    pub frame: Option<Vec<i64>>,
    pub kind: FrameKind,
    pub start: usize,
    pub size: usize,
}

/// Sink that copies every notification out of the borrowed history slots.
#[derive(Default)]
pub struct Collector {
    pub frames: Vec<SeenFrame>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the accepted main-frame payloads, in order.
    pub fn valid_main_frames(&self) -> Vec<Vec<i64>> {
        self.frames
            .iter()
            .filter(|f| {
                f.valid && matches!(f.kind, FrameKind::Intra | FrameKind::Inter)
            })
            .filter_map(|f| f.frame.clone())
            .collect()
    }
}

impl FrameSink for Collector {
    fn on_frame_ready(
        &mut self,
        valid: bool,
        frame: Option<&[i64]>,
        kind: FrameKind,
        frame_start: usize,
        frame_size: usize,
    ) {
        self.frames.push(SeenFrame {
            valid,
            frame: frame.map(<[i64]>::to_vec),
            kind,
            start: frame_start,
            size: frame_size,
        });
    }
}
