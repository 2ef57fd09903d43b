// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event frames.
//!
//! An E-frame opens with a one-byte event ID followed by a kind-specific
//! payload. Unknown IDs are discarded without corrupting the stream; the
//! log-end marker additionally clamps the stream so trailing bytes are
//! never scanned.

use bbx_stream::ByteStream;

/// Wire IDs of the recognized event kinds.
pub mod event_id {
    pub const SYNC_BEEP: u8 = 0;
    pub const AUTOTUNE_CYCLE_START: u8 = 10;
    pub const AUTOTUNE_CYCLE_RESULT: u8 = 11;
    pub const AUTOTUNE_TARGETS: u8 = 12;
    pub const LOG_END: u8 = 255;
}

/// Marker payload of the log-end event.
pub const END_OF_LOG_MESSAGE: &[u8; 11] = b"End of log\0";

/// A decoded event record.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// Beeper sync pulse, for aligning the log with audio/video.
    SyncBeep {
        /// Time of the beep in microseconds.
        time: u32,
    },
    /// Start of one autotune cycle.
    AutotuneCycleStart {
        phase: u8,
        cycle: u8,
        rising: bool,
        p: u8,
        i: u8,
        d: u8,
    },
    /// Result of one autotune cycle.
    AutotuneCycleResult {
        overshot: u8,
        p: u8,
        i: u8,
        d: u8,
    },
    /// Autotune target angles, in degrees.
    AutotuneTargets {
        current_angle: f32,
        target_angle: i8,
        target_angle_at_peak: i8,
        first_peak_angle: f32,
        second_peak_angle: f32,
    },
    /// The firmware closed the log.
    LogEnd,
}

/// Read one event-frame payload. Returns `None` for unknown event IDs or a
/// log-end marker whose literal does not match (those bytes only looked
/// like an event header).
///
/// A genuine log-end marker clamps `stream.end` to the current position so
/// the dispatcher stops at it.
pub(crate) fn parse_event(stream: &mut ByteStream<'_>) -> Option<LogEvent> {
    let event_id = stream.read_byte()?;

    match event_id {
        event_id::SYNC_BEEP => Some(LogEvent::SyncBeep {
            time: stream.read_unsigned_vb(),
        }),
        event_id::AUTOTUNE_CYCLE_START => {
            let phase = stream.read_byte().unwrap_or(0);
            let cycle_and_rising = stream.read_byte().unwrap_or(0);
            Some(LogEvent::AutotuneCycleStart {
                phase,
                cycle: cycle_and_rising & 0x7F,
                rising: cycle_and_rising & 0x80 != 0,
                p: stream.read_byte().unwrap_or(0),
                i: stream.read_byte().unwrap_or(0),
                d: stream.read_byte().unwrap_or(0),
            })
        }
        event_id::AUTOTUNE_CYCLE_RESULT => Some(LogEvent::AutotuneCycleResult {
            overshot: stream.read_byte().unwrap_or(0),
            p: stream.read_byte().unwrap_or(0),
            i: stream.read_byte().unwrap_or(0),
            d: stream.read_byte().unwrap_or(0),
        }),
        event_id::AUTOTUNE_TARGETS => Some(LogEvent::AutotuneTargets {
            // Angles are logged in decidegrees
            current_angle: f32::from(stream.read_s16()) / 10.0,
            target_angle: stream.read_s8(),
            target_angle_at_peak: stream.read_s8(),
            first_peak_angle: f32::from(stream.read_s16()) / 10.0,
            second_peak_angle: f32::from(stream.read_s16()) / 10.0,
        }),
        event_id::LOG_END => {
            let message = stream.read_string_bytes(END_OF_LOG_MESSAGE.len());
            if message == END_OF_LOG_MESSAGE {
                // The log is over; ignore whatever follows
                stream.end = stream.pos;
                Some(LogEvent::LogEnd)
            } else {
                None
            }
        }
        _ => None,
    }
}
