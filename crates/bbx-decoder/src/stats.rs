// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode statistics.
//!
//! Per-frame-kind counters plus a lazily-populated per-field value
//! envelope. Everything is zero-initialized up front and serializable so a
//! host can export the numbers next to the decoded data.

use crate::parser::FLIGHT_LOG_MAX_FRAME_LENGTH;
use crate::schema::FrameKind;
use serde::Serialize;

/// Value envelope of one main-frame field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldStats {
    pub min: i64,
    pub max: i64,
}

/// Counters for one frame kind.
#[derive(Debug, Clone, Serialize)]
pub struct FrameTypeStats {
    /// Bytes consumed by terminated frames of this kind.
    pub bytes: u64,
    /// Frame-size histogram, indexed by frame length in bytes.
    pub size_count: Vec<u32>,
    /// Frames that terminated cleanly and were accepted.
    pub valid_count: u64,
    /// Frames judged corrupt (oversized or followed by garbage).
    pub corrupt_count: u64,
    /// Frames that terminated cleanly but were rejected by their
    /// completion routine (e.g. unrecognized events).
    pub desync_count: u64,
}

impl Default for FrameTypeStats {
    fn default() -> Self {
        Self {
            bytes: 0,
            size_count: vec![0; FLIGHT_LOG_MAX_FRAME_LENGTH + 1],
            valid_count: 0,
            corrupt_count: 0,
            desync_count: 0,
        }
    }
}

/// Aggregate statistics for one decode run (or several, if the host does
/// not reset between sections).
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogStats {
    /// Bytes traversed by the dispatcher.
    pub total_bytes: u64,
    /// Corrupt frames across all kinds.
    pub total_corrupt_frames: u64,
    /// Iterations the logger skipped on purpose (sampling-rate holes, not
    /// corruption).
    pub intentionally_absent_iterations: u64,
    /// Per-kind counters, indexed by [`FrameKind`].
    frame: [FrameTypeStats; 5],
    /// Per-main-field envelopes, populated on first observation.
    pub field: Vec<Option<FieldStats>>,
}

impl LogStats {
    /// Counters for one frame kind.
    #[must_use]
    pub fn frame(&self, kind: FrameKind) -> &FrameTypeStats {
        &self.frame[kind.index()]
    }

    pub(crate) fn frame_mut(&mut self, kind: FrameKind) -> &mut FrameTypeStats {
        &mut self.frame[kind.index()]
    }

    /// Fold an accepted main frame into the per-field envelopes.
    pub(crate) fn update_fields(&mut self, frame: &[i64]) {
        if self.field.len() < frame.len() {
            self.field.resize(frame.len(), None);
        }

        for (slot, &value) in self.field.iter_mut().zip(frame) {
            match slot {
                Some(stats) => {
                    stats.min = stats.min.min(value);
                    stats.max = stats.max.max(value);
                }
                None => *slot = Some(FieldStats { min: value, max: value }),
            }
        }
    }

    /// Reset every counter and envelope to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = LogStats::default();
        for kind in [
            FrameKind::Intra,
            FrameKind::Inter,
            FrameKind::Gps,
            FrameKind::GpsHome,
            FrameKind::Event,
        ] {
            let f = stats.frame(kind);
            assert_eq!(f.bytes, 0);
            assert_eq!(f.valid_count, 0);
            assert_eq!(f.corrupt_count, 0);
            assert_eq!(f.desync_count, 0);
            assert_eq!(f.size_count.len(), FLIGHT_LOG_MAX_FRAME_LENGTH + 1);
        }
    }

    #[test]
    fn test_field_envelope_lazy_init() {
        let mut stats = LogStats::default();
        stats.update_fields(&[5, -3]);
        stats.update_fields(&[2, 7]);

        assert_eq!(stats.field[0], Some(FieldStats { min: 2, max: 5 }));
        assert_eq!(stats.field[1], Some(FieldStats { min: -3, max: 7 }));
    }

    #[test]
    fn test_stats_serialize() {
        let mut stats = LogStats::default();
        stats.total_bytes = 42;
        stats.update_fields(&[1]);

        let json = serde_json::to_string(&stats).expect("serialize");
        assert!(json.contains("\"total_bytes\":42"));
        assert!(json.contains("\"desync_count\":0"));
    }
}
