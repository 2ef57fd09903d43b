// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Predictor engine.
//!
//! A predictor reconstructs a true field value by adding a deterministic
//! correction, derived from frame history and system configuration, to the
//! raw delta read off the wire. Missing history degrades the history-based
//! predictors to no-ops; a missing reference *field* (motor[0], the home
//! coordinates) is a schema error and aborts the parse.

use crate::config::SysConfig;
use crate::parser::ParseError;
use crate::schema::Predictor;

/// Read-only surroundings for predictor application. Assembled once per
/// frame by the decoder.
pub(crate) struct PredictorContext<'a> {
    pub sys: &'a SysConfig,
    /// Index of `motor[0]` in the main field set, if declared.
    pub motor0_index: Option<usize>,
    /// Last committed GPS home frame.
    pub home_values: &'a [i64],
    /// Index of `GPS_home[0]` in the home field set, if declared.
    pub home0_index: Option<usize>,
    /// Index of `GPS_home[1]` in the home field set, if declared.
    pub home1_index: Option<usize>,
    /// Time field of the last accepted main frame, −1 if none yet.
    pub last_main_frame_time: i64,
}

/// Apply the correction for `predictor_id` to `value`.
///
/// `current` is the partially decoded frame (fields before `field_index`
/// are already final); `previous`/`previous2` are the history views, absent
/// right after a reset or invalidation.
pub(crate) fn apply(
    ctx: &PredictorContext<'_>,
    predictor_id: u32,
    field_index: usize,
    mut value: i64,
    current: &[i64],
    previous: Option<&[i64]>,
    previous2: Option<&[i64]>,
) -> Result<i64, ParseError> {
    let predictor = Predictor::from_id(predictor_id).ok_or(ParseError::UnsupportedPredictor {
        id: predictor_id,
        field: field_index,
    })?;

    match predictor {
        Predictor::None => {}
        Predictor::MinThrottle => value += ctx.sys.min_throttle,
        Predictor::Const1500 => value += 1500,
        Predictor::VbatRef => value += ctx.sys.vbat_ref,
        Predictor::Motor0 => {
            let index = ctx.motor0_index.ok_or(ParseError::MissingReferenceField {
                field_name: "motor[0]",
            })?;
            value += current[index];
        }
        Predictor::Previous => {
            if let Some(prev) = previous {
                value += prev[field_index];
            }
        }
        Predictor::StraightLine => {
            if let (Some(prev), Some(prev2)) = (previous, previous2) {
                value += 2 * prev[field_index] - prev2[field_index];
            }
        }
        Predictor::Average2 => {
            if let (Some(prev), Some(prev2)) = (previous, previous2) {
                // Rust's integer division truncates toward zero, which is
                // the convention the encoder used
                value += (prev[field_index] + prev2[field_index]) / 2;
            }
        }
        Predictor::HomeCoord => {
            let index = ctx.home0_index.ok_or(ParseError::MissingReferenceField {
                field_name: "GPS_home[0]",
            })?;
            value += ctx.home_values[index];
        }
        Predictor::HomeCoord1 => {
            let index = ctx.home1_index.ok_or(ParseError::MissingReferenceField {
                field_name: "GPS_home[1]",
            })?;
            value += ctx.home_values[index];
        }
        Predictor::LastMainTime => {
            if ctx.last_main_frame_time != -1 {
                value += ctx.last_main_frame_time;
            }
        }
        // INC is handled before the wire read and never reaches here; a
        // predictor vector that routes it through a tag group is malformed.
        Predictor::Inc => {
            return Err(ParseError::UnsupportedPredictor {
                id: predictor_id,
                field: field_index,
            });
        }
    }

    Ok(value)
}
