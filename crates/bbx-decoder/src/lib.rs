// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Blackbox flight-log decoder
//!
//! Decoder core for the compact "Blackbox" telemetry format flight
//! controllers write: an ASCII header describing the frame schema, followed
//! by tightly packed binary frames recording the control loop at hundreds
//! of hertz. The decoder turns that byte stream into arrays of integer
//! field values keyed by name, with validity flags and statistics, staying
//! useful across truncation and in-flight corruption.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        LogParser                             |
//! |  dispatcher -> frame decode -> predictors -> validity gate   |
//! +--------------------------------------------------------------+
//! |  HeaderParser   | HistoryRing | PredictorEngine | Stats      |
//! +--------------------------------------------------------------+
//! |            bbx-stream (cursor + wire primitives)             |
//! +--------------------------------------------------------------+
//! ```
//!
//! - The **header** declares, per frame kind, the field names and the
//!   parallel predictor/encoding vectors ([`schema`]).
//! - **I-frames** are self-contained keyframes; **P-frames** store deltas
//!   against a ring of recent frames and are reconstructed by the
//!   predictors. GPS readings predict against the last home frame.
//! - Frames have no length prefix: a frame ends where the next recognized
//!   tag begins. Damage is healed by rewinding one byte past the suspect
//!   frame and rescanning.
//!
//! ## Quick Start
//!
//! ```
//! use bbx_decoder::{FrameKind, LogParser};
//!
//! let mut log = Vec::new();
//! log.extend_from_slice(b"H Field I name:loopIteration,time\n");
//! log.extend_from_slice(b"H Field I predictor:0,0\n");
//! log.extend_from_slice(b"H Field I encoding:1,1\n");
//! log.extend_from_slice(b"H Field P predictor:6,2\n");
//! log.extend_from_slice(b"H Field P encoding:9,0\n");
//! log.extend_from_slice(&[b'I', 0x00, 0xE8, 0x07]); // iteration 0, time 1000
//!
//! let mut parser = LogParser::new(&log);
//! parser.parse_header(None, None).expect("usable header");
//!
//! let mut frames = Vec::new();
//! let mut sink = |valid: bool, frame: Option<&[i64]>, _kind: FrameKind, _off: usize, _len: usize| {
//!     if valid {
//!         frames.push(frame.expect("valid frames carry data").to_vec());
//!     }
//! };
//! parser.parse_log_data(false, None, None, &mut sink).expect("decode");
//!
//! assert_eq!(frames, vec![vec![0, 1000]]);
//! ```
//!
//! The frame slice passed to the sink borrows the decoder's history slot;
//! copy it if it must outlive the callback.

pub mod config;
pub mod event;
pub mod parser;
pub mod schema;
pub mod stats;

mod header;
mod history;
mod predictor;

pub use config::{FirmwareType, SysConfig};
pub use event::{LogEvent, END_OF_LOG_MESSAGE};
pub use parser::{
    FrameSink, LogParser, ParseError, FIELD_INDEX_ITERATION, FIELD_INDEX_TIME,
    FLIGHT_LOG_MAX_FRAME_LENGTH, LOG_START_MARKER, MAXIMUM_ITERATION_JUMP, MAXIMUM_TIME_JUMP,
};
pub use schema::{Encoding, FrameDef, FrameDefs, FrameKind, Predictor};
pub use stats::{FieldStats, FrameTypeStats, LogStats};
