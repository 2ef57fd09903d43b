// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Header-line parsing.
//!
//! Header lines look like `H <key>:<value>\n`. The dispatcher hands over
//! after reading the `H`; a line is only valid if a space follows
//! immediately. Unknown keys are ignored so newer firmwares stay readable.

use crate::config::{FirmwareType, SysConfig};
use crate::schema::{FrameDefs, Predictor};
use bbx_stream::ByteStream;

/// Longest header line we will consume, in bytes.
const MAX_HEADER_LINE_LENGTH: usize = 1024;

/// Consume one header line from just after its `H` tag and fold it into the
/// configuration and frame definitions. Malformed lines are skipped.
pub(crate) fn parse_header_line(
    stream: &mut ByteStream<'_>,
    sys: &mut SysConfig,
    defs: &mut FrameDefs,
) {
    if stream.peek_char() != Some(b' ') {
        return;
    }
    stream.read_char();

    let mut raw = Vec::with_capacity(64);
    for _ in 0..MAX_HEADER_LINE_LENGTH {
        match stream.read_char() {
            None | Some(b'\n') | Some(0) => break,
            Some(c) => raw.push(c),
        }
    }

    let line = String::from_utf8_lossy(&raw);
    let Some((name, value)) = line.split_once(':') else {
        return;
    };

    apply_header_field(name, value, sys, defs);
}

fn apply_header_field(name: &str, value: &str, sys: &mut SysConfig, defs: &mut FrameDefs) {
    match name {
        "Field I name" => defs.intra.set_names(split_names(value)),
        "Field G name" => defs.gps.set_names(split_names(value)),
        "Field H name" => defs.gps_home.set_names(split_names(value)),

        "Field I signed" => defs.intra.signed = parse_ints(value).iter().map(|&v| v != 0).collect(),

        "Field I predictor" => defs.intra.predictors = parse_ids(value),
        "Field I encoding" => defs.intra.encodings = parse_ids(value),
        "Field P predictor" => defs.inter.predictors = parse_ids(value),
        "Field P encoding" => defs.inter.encodings = parse_ids(value),
        "Field G predictor" => defs.gps.predictors = parse_ids(value),
        "Field G encoding" => defs.gps.encodings = parse_ids(value),
        "Field H predictor" => defs.gps_home.predictors = parse_ids(value),
        "Field H encoding" => defs.gps_home.encodings = parse_ids(value),

        "I interval" => {
            if let Ok(interval) = value.trim().parse::<i64>() {
                sys.frame_interval_i = interval.max(1);
            }
        }
        "P interval" => {
            // N/D sampling fraction, e.g. "1/4"
            if let Some((num, denom)) = value.trim().split_once('/') {
                if let (Ok(num), Ok(denom)) = (num.parse::<i64>(), denom.parse::<i64>()) {
                    if num >= 1 && denom >= 1 {
                        sys.frame_interval_p_num = num;
                        sys.frame_interval_p_denom = denom;
                    }
                }
            }
        }
        "Data version" => {
            if let Ok(version) = value.trim().parse() {
                sys.data_version = version;
            }
        }
        "Firmware type" => {
            sys.firmware_type = if value == "Cleanflight" {
                FirmwareType::Cleanflight
            } else {
                FirmwareType::Baseflight
            };
        }

        "minthrottle" => set_int(value, &mut sys.min_throttle),
        "maxthrottle" => set_int(value, &mut sys.max_throttle),
        "rcRate" => set_int(value, &mut sys.rc_rate),
        "vbatscale" => set_int(value, &mut sys.vbat_scale),
        "vbatref" => set_int(value, &mut sys.vbat_ref),
        "acc_1G" => set_int(value, &mut sys.acc_1g),

        "vbatcellvoltage" => {
            let params = parse_ints(value);
            if let [min, warning, max] = params[..] {
                sys.vbat_min_cell_voltage = min;
                sys.vbat_warning_cell_voltage = warning;
                sys.vbat_max_cell_voltage = max;
            }
        }
        "currentMeter" => {
            let params = parse_ints(value);
            if let [offset, scale] = params[..] {
                sys.current_meter_offset = offset;
                sys.current_meter_scale = scale;
            }
        }
        "gyro.scale" => {
            if let Some(raw) = parse_hex_float(value) {
                sys.set_gyro_scale(f64::from(raw));
            }
        }

        _ => {} // unknown keys are not an error
    }
}

/// Post-process the frame definitions once the header is exhausted.
///
/// The main field names and signedness declared for I-frames apply to
/// P-frames too. G-frame predictor vectors declare both home-relative
/// coordinates with the same ID; the second entry of each adjacent pair is
/// rewritten to the synthetic second-coordinate predictor so latitude and
/// longitude resolve against their own references.
pub(crate) fn finalize_defs(defs: &mut FrameDefs) {
    defs.inter.names = defs.intra.names.clone();
    defs.inter.name_to_index = defs.intra.name_to_index.clone();
    defs.inter.signed = defs.intra.signed.clone();

    let home_id = Predictor::HomeCoord.id();
    for i in 1..defs.gps.predictors.len() {
        if defs.gps.predictors[i - 1] == home_id && defs.gps.predictors[i] == home_id {
            defs.gps.predictors[i] = Predictor::HOME_COORD_1_ID;
        }
    }
}

fn split_names(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}

fn set_int(value: &str, field: &mut i64) {
    if let Ok(parsed) = value.trim().parse::<i64>() {
        *field = parsed;
    }
}

fn parse_ints(value: &str) -> Vec<i64> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

fn parse_ids(value: &str) -> Vec<u32> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

/// Parse a hex-encoded IEEE-754 single, e.g. `0x3a83126f`.
fn parse_hex_float(value: &str) -> Option<f32> {
    let digits = value
        .trim()
        .strip_prefix("0x")
        .or_else(|| value.trim().strip_prefix("0X"))
        .unwrap_or_else(|| value.trim());
    u32::from_str_radix(digits, 16).ok().map(f32::from_bits)
}
