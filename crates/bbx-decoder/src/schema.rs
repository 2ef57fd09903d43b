// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame schema: frame kinds, field predictors and field encodings.
//!
//! Predictor and encoding IDs are wire-stable (they appear as integers in
//! the log header), so each is modeled as a closed enum plus its raw ID.
//! Decoding converts a raw ID exactly once per field visit and fails loudly
//! on anything outside the closed set.

use std::collections::HashMap;

/// The five frame kinds a log can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Self-contained main frame; resets prediction history.
    Intra,
    /// Delta main frame predicted from history.
    Inter,
    /// GPS position reading.
    Gps,
    /// GPS home reference, the base for position prediction.
    GpsHome,
    /// Event record.
    Event,
}

impl FrameKind {
    /// Map a frame tag byte to its kind.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'I' => Some(Self::Intra),
            b'P' => Some(Self::Inter),
            b'G' => Some(Self::Gps),
            b'H' => Some(Self::GpsHome),
            b'E' => Some(Self::Event),
            _ => None,
        }
    }

    /// The tag byte that introduces this frame kind on the wire.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Intra => b'I',
            Self::Inter => b'P',
            Self::Gps => b'G',
            Self::GpsHome => b'H',
            Self::Event => b'E',
        }
    }

    /// Dense index for per-kind statistics arrays.
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Intra => 0,
            Self::Inter => 1,
            Self::Gps => 2,
            Self::GpsHome => 3,
            Self::Event => 4,
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}

/// Field predictor: the correction added to an on-wire delta to recover the
/// true field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    /// The value is stored as-is.
    None,
    /// Predict the previous frame's value.
    Previous,
    /// Linear extrapolation from the two previous frames.
    StraightLine,
    /// Average of the two previous frames.
    Average2,
    /// Predict the configured minimum throttle.
    MinThrottle,
    /// Predict the already-decoded motor[0] value of this frame.
    Motor0,
    /// Iteration counter: previous value plus skipped frames plus one. Has
    /// no wire payload.
    Inc,
    /// Predict the first GPS home coordinate.
    HomeCoord,
    /// Midpoint RC command (1500 µs).
    Const1500,
    /// Predict the battery voltage reference.
    VbatRef,
    /// Predict the time of the last main frame.
    LastMainTime,
    /// Predict the second GPS home coordinate. Never appears on the wire;
    /// synthesized for the second entry of an adjacent home-coordinate pair
    /// after header parsing.
    HomeCoord1,
}

impl Predictor {
    /// Synthetic ID for [`Predictor::HomeCoord1`], outside the wire range.
    pub const HOME_COORD_1_ID: u32 = 256;

    /// Map a raw predictor ID to the closed set.
    #[must_use]
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::Previous),
            2 => Some(Self::StraightLine),
            3 => Some(Self::Average2),
            4 => Some(Self::MinThrottle),
            5 => Some(Self::Motor0),
            6 => Some(Self::Inc),
            7 => Some(Self::HomeCoord),
            8 => Some(Self::Const1500),
            9 => Some(Self::VbatRef),
            10 => Some(Self::LastMainTime),
            Self::HOME_COORD_1_ID => Some(Self::HomeCoord1),
            _ => None,
        }
    }

    /// The raw ID of this predictor.
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Previous => 1,
            Self::StraightLine => 2,
            Self::Average2 => 3,
            Self::MinThrottle => 4,
            Self::Motor0 => 5,
            Self::Inc => 6,
            Self::HomeCoord => 7,
            Self::Const1500 => 8,
            Self::VbatRef => 9,
            Self::LastMainTime => 10,
            Self::HomeCoord1 => Self::HOME_COORD_1_ID,
        }
    }
}

/// Field encoding: the on-wire byte layout of one or more raw deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// ZigZag variable-byte signed integer.
    SignedVb,
    /// Variable-byte unsigned integer.
    UnsignedVb,
    /// Unsigned variable-byte, 14-bit sign-extended and negated.
    Neg14Bit,
    /// Group of up to eight signed VBs behind a presence bitmask.
    Tag8_8Svb,
    /// Group of three packed signed values.
    Tag2_3S32,
    /// Group of four packed signed values (two wire variants).
    Tag8_4S16,
    /// No wire payload; the value is zero before prediction.
    Null,
}

impl Encoding {
    /// Map a raw encoding ID to the closed set.
    #[must_use]
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::SignedVb),
            1 => Some(Self::UnsignedVb),
            3 => Some(Self::Neg14Bit),
            6 => Some(Self::Tag8_8Svb),
            7 => Some(Self::Tag2_3S32),
            8 => Some(Self::Tag8_4S16),
            9 => Some(Self::Null),
            _ => None,
        }
    }

    /// The raw ID of this encoding.
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::SignedVb => 0,
            Self::UnsignedVb => 1,
            Self::Neg14Bit => 3,
            Self::Tag8_8Svb => 6,
            Self::Tag2_3S32 => 7,
            Self::Tag8_4S16 => 8,
            Self::Null => 9,
        }
    }
}

/// Field definitions for one frame kind: names and the parallel predictor,
/// encoding and signedness vectors, as declared by the header.
#[derive(Debug, Clone, Default)]
pub struct FrameDef {
    /// Field names in wire order.
    pub names: Vec<String>,
    /// Name to wire-order index.
    pub name_to_index: HashMap<String, usize>,
    /// Raw predictor IDs, parallel to `names`.
    pub predictors: Vec<u32>,
    /// Raw encoding IDs, parallel to `names`.
    pub encodings: Vec<u32>,
    /// Per-field signedness flags, parallel to `names`. Optional.
    pub signed: Vec<bool>,
}

impl FrameDef {
    /// Number of fields in this frame kind.
    #[must_use]
    pub fn count(&self) -> usize {
        self.names.len()
    }

    /// Install field names and derive the name index.
    pub fn set_names(&mut self, names: Vec<String>) {
        self.name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        self.names = names;
    }

    /// Wire-order index of a named field.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }
}

/// The per-frame-kind schema registry.
#[derive(Debug, Clone, Default)]
pub struct FrameDefs {
    /// I-frame fields (the main field set).
    pub intra: FrameDef,
    /// P-frame fields; names and signedness mirror the I-frame set.
    pub inter: FrameDef,
    /// G-frame fields, present only if the header declared them.
    pub gps: FrameDef,
    /// H-frame fields, present only if the header declared them.
    pub gps_home: FrameDef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind_tag_roundtrip() {
        for kind in [
            FrameKind::Intra,
            FrameKind::Inter,
            FrameKind::Gps,
            FrameKind::GpsHome,
            FrameKind::Event,
        ] {
            assert_eq!(FrameKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(FrameKind::from_tag(b'X'), None);
        assert_eq!(FrameKind::from_tag(0x00), None);
    }

    #[test]
    fn test_predictor_ids_are_wire_stable() {
        assert_eq!(Predictor::from_id(0), Some(Predictor::None));
        assert_eq!(Predictor::from_id(3), Some(Predictor::Average2));
        assert_eq!(Predictor::from_id(6), Some(Predictor::Inc));
        assert_eq!(Predictor::from_id(10), Some(Predictor::LastMainTime));
        assert_eq!(Predictor::from_id(256), Some(Predictor::HomeCoord1));
        assert_eq!(Predictor::from_id(11), None);
        assert_eq!(Predictor::Average2.id(), 3);
        assert_eq!(Predictor::HomeCoord1.id(), 256);
    }

    #[test]
    fn test_encoding_ids_are_wire_stable() {
        assert_eq!(Encoding::from_id(0), Some(Encoding::SignedVb));
        assert_eq!(Encoding::from_id(1), Some(Encoding::UnsignedVb));
        assert_eq!(Encoding::from_id(3), Some(Encoding::Neg14Bit));
        assert_eq!(Encoding::from_id(9), Some(Encoding::Null));
        // 2, 4 and 5 are not assigned
        assert_eq!(Encoding::from_id(2), None);
        assert_eq!(Encoding::from_id(4), None);
        assert_eq!(Encoding::from_id(5), None);
    }

    #[test]
    fn test_frame_def_name_index() {
        let mut def = FrameDef::default();
        def.set_names(vec![
            "loopIteration".into(),
            "time".into(),
            "motor[0]".into(),
        ]);
        assert_eq!(def.count(), 3);
        assert_eq!(def.index_of("motor[0]"), Some(2));
        assert_eq!(def.index_of("motor[1]"), None);
    }
}
