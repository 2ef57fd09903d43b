// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! System configuration discovered from the log header.
//!
//! Every value has a firmware-stock default so a log with a sparse header
//! still decodes; header lines overwrite defaults field by field.

use serde::{Deserialize, Serialize};

/// Firmware family that produced the log.
///
/// Only distinguishes the conventions that change decoding: Cleanflight
/// writes `gyro.scale` in a different unit than baseflight and is
/// normalized at ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FirmwareType {
    #[default]
    Unknown,
    Baseflight,
    Cleanflight,
}

/// Header-derived system configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysConfig {
    /// Iterations between I-frames (keyframe period), at least 1.
    pub frame_interval_i: i64,
    /// Numerator of the P-frame sampling fraction.
    pub frame_interval_p_num: i64,
    /// Denominator of the P-frame sampling fraction.
    pub frame_interval_p_denom: i64,
    /// Firmware family (affects gyro-scale units).
    pub firmware_type: FirmwareType,
    /// Log data version; selects the Tag8_4S16 wire variant.
    pub data_version: u32,
    /// Lowest motor command, the base for motor-field prediction.
    pub min_throttle: i64,
    /// Highest motor command.
    pub max_throttle: i64,
    /// RC rate setting.
    pub rc_rate: i64,
    /// Battery voltage reference (ADC reading at calibration).
    pub vbat_ref: i64,
    /// Battery voltage scale.
    pub vbat_scale: i64,
    /// Minimum cell voltage, tenths of a volt.
    pub vbat_min_cell_voltage: i64,
    /// Warning cell voltage, tenths of a volt.
    pub vbat_warning_cell_voltage: i64,
    /// Maximum cell voltage, tenths of a volt.
    pub vbat_max_cell_voltage: i64,
    /// Current meter offset.
    pub current_meter_offset: i64,
    /// Current meter scale.
    pub current_meter_scale: i64,
    /// Accelerometer reading equal to 1 g.
    pub acc_1g: i64,
    /// Gyro scale in the baseflight convention (radians/µs per LSB).
    pub gyro_scale: f64,
}

impl SysConfig {
    /// Record a raw `gyro.scale` header value, normalizing Cleanflight's
    /// degrees/second convention onto the baseflight one.
    pub fn set_gyro_scale(&mut self, raw: f64) {
        self.gyro_scale = if self.firmware_type == FirmwareType::Cleanflight {
            raw * (std::f64::consts::PI / 180.0) * 0.000_001
        } else {
            raw
        };
    }
}

impl Default for SysConfig {
    fn default() -> Self {
        Self {
            frame_interval_i: 32,
            frame_interval_p_num: 1,
            frame_interval_p_denom: 1,
            firmware_type: FirmwareType::Unknown,
            data_version: 1,
            min_throttle: 1150,
            max_throttle: 1850,
            rc_rate: 90,
            vbat_ref: 4095,
            vbat_scale: 110,
            vbat_min_cell_voltage: 33,
            vbat_warning_cell_voltage: 35,
            vbat_max_cell_voltage: 43,
            current_meter_offset: 0,
            current_meter_scale: 400,
            acc_1g: 1,
            gyro_scale: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SysConfig::default();
        assert_eq!(cfg.frame_interval_i, 32);
        assert_eq!(cfg.frame_interval_p_num, 1);
        assert_eq!(cfg.frame_interval_p_denom, 1);
        assert_eq!(cfg.firmware_type, FirmwareType::Unknown);
        assert_eq!(cfg.min_throttle, 1150);
    }

    #[test]
    fn test_gyro_scale_passthrough_for_baseflight() {
        let mut cfg = SysConfig {
            firmware_type: FirmwareType::Baseflight,
            ..SysConfig::default()
        };
        cfg.set_gyro_scale(0.5);
        assert_eq!(cfg.gyro_scale, 0.5);
    }

    #[test]
    fn test_gyro_scale_normalized_for_cleanflight() {
        let mut cfg = SysConfig {
            firmware_type: FirmwareType::Cleanflight,
            ..SysConfig::default()
        };
        cfg.set_gyro_scale(0.001);
        let expected = 0.001 * (std::f64::consts::PI / 180.0) * 0.000_001;
        assert!((cfg.gyro_scale - expected).abs() < 1e-20);
    }
}
