//! Meter and level scaling helpers.
//!
//! The radio reports levels and meter readings as big-endian 16-bit raw
//! values. Levels (power, RF gain, squelch, NR) scale against a full-scale
//! constant of `0x0255`; meters (S, Vd) against `0x0241`; SWR against
//! `0x0120`. All functions here are pure.

/// Full-scale raw value for level settings (0x0255).
pub const LEVEL_FULL_SCALE: u16 = 0x0255;

/// Full-scale raw value for the S-meter and drain-voltage meters (0x0241).
pub const METER_FULL_SCALE: u16 = 0x0241;

/// Scale divisor for the SWR meter (0x0120).
pub const SWR_SCALE: u16 = 0x0120;

/// Converts a raw 16-bit level value to a 0-100 percentage.
pub fn percent_from_raw(raw: u16) -> u8 {
    let pct = (f64::from(raw) / f64::from(LEVEL_FULL_SCALE) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Converts a 0-100 percentage to the raw 16-bit level value.
pub fn raw_from_percent(percent: u8) -> u16 {
    (f64::from(LEVEL_FULL_SCALE) * (f64::from(percent) / 100.0)) as u16
}

/// Formats a raw S-meter reading as the conventional "S0".."S9+60" label.
///
/// The raw value scales to 0..=18 S-units; readings above S9 map onto the
/// "+dB" ladder. Scale codes 13 through 16 all read "+40" in the reference
/// capture; that flatline is preserved here unchanged until the radio's
/// documented ladder says otherwise.
pub fn s_meter_label(raw: u16) -> String {
    let value = (f64::from(raw) / f64::from(METER_FULL_SCALE) * 18.0).round() as i64;
    if value <= 9 {
        return format!("S{}", value.max(0));
    }
    let plus = match value {
        10 => "10",
        11 => "20",
        12 => "30",
        13..=16 => "40",
        17 | 18 => "50",
        _ => "60",
    };
    format!("S9+{plus}")
}

/// Converts a raw SWR reading to the ratio (1.0 = perfect match).
pub fn swr_from_raw(raw: u16) -> f64 {
    (f64::from(raw) / f64::from(SWR_SCALE)) * 2.0 + 1.0
}

/// Converts a raw drain-voltage reading to volts.
pub fn vd_from_raw(raw: u16) -> f64 {
    (f64::from(raw) / f64::from(METER_FULL_SCALE)) * 16.0
}
