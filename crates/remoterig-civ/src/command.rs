//! CI-V command identities and builders.
//!
//! Every command the engine can have in flight has a [`CommandId`]; the
//! pending table is keyed by it, so at most one instance of each command
//! is outstanding at any time. Builder functions are pure -- they produce
//! the exact wire bytes for a configurable radio address and perform no
//! I/O.

use remoterig_core::meter;

use crate::frame::{encode_frame, encode_frequency};

/// Logical identity of a CI-V command.
///
/// One variant per named command; a *get* and the corresponding *set* are
/// distinct commands and may be pending simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    GetPower,
    GetSMeter,
    GetOvf,
    GetSwr,
    GetTransmitStatus,
    GetTuneStatus,
    GetPreamp,
    GetAgc,
    GetVd,
    GetTuningStep,
    GetRfGain,
    GetSquelch,
    GetNrLevel,
    GetNrEnabled,
    GetSplit,
    GetMainVfoFreq,
    GetSubVfoFreq,
    GetMainVfoMode,
    GetSubVfoMode,
    SetPower,
    SetRfGain,
    SetSquelch,
    SetNrLevel,
    SetMainVfoFreq,
    SetSubVfoFreq,
    SetMode,
    SetSubVfoMode,
    SetPtt,
    SetTune,
    SetDataMode,
    SetPreamp,
    SetAgc,
    SetNrEnabled,
    SetTuningStep,
    SetVfo,
    SetSplit,
}

impl CommandId {
    /// Short name used in retry logging.
    pub fn name(&self) -> &'static str {
        match self {
            CommandId::GetPower => "getPwr",
            CommandId::GetSMeter => "getS",
            CommandId::GetOvf => "getOVF",
            CommandId::GetSwr => "getSWR",
            CommandId::GetTransmitStatus => "getTransmitStatus",
            CommandId::GetTuneStatus => "getTuneStatus",
            CommandId::GetPreamp => "getPreamp",
            CommandId::GetAgc => "getAGC",
            CommandId::GetVd => "getVd",
            CommandId::GetTuningStep => "getTS",
            CommandId::GetRfGain => "getRFGain",
            CommandId::GetSquelch => "getSQL",
            CommandId::GetNrLevel => "getNR",
            CommandId::GetNrEnabled => "getNREnabled",
            CommandId::GetSplit => "getSplit",
            CommandId::GetMainVfoFreq => "getMainVFOFreq",
            CommandId::GetSubVfoFreq => "getSubVFOFreq",
            CommandId::GetMainVfoMode => "getMainVFOMode",
            CommandId::GetSubVfoMode => "getSubVFOMode",
            CommandId::SetPower => "setPwr",
            CommandId::SetRfGain => "setRFGain",
            CommandId::SetSquelch => "setSQL",
            CommandId::SetNrLevel => "setNR",
            CommandId::SetMainVfoFreq => "setMainVFOFreq",
            CommandId::SetSubVfoFreq => "setSubVFOFreq",
            CommandId::SetMode => "setMode",
            CommandId::SetSubVfoMode => "setSubVFOMode",
            CommandId::SetPtt => "setPTT",
            CommandId::SetTune => "setTune",
            CommandId::SetDataMode => "setDataMode",
            CommandId::SetPreamp => "setPreamp",
            CommandId::SetAgc => "setAGC",
            CommandId::SetNrEnabled => "setNREnabled",
            CommandId::SetTuningStep => "setTS",
            CommandId::SetVfo => "setVFO",
            CommandId::SetSplit => "setSplit",
        }
    }
}

// ---------------------------------------------------------------
// Getters
// ---------------------------------------------------------------

/// Read TX power level (cmd 0x14 sub 0x0A).
pub fn get_power(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x14, 0x0A])
}

/// Read the S-meter (cmd 0x15 sub 0x02).
pub fn get_s_meter(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x15, 0x02])
}

/// Read the front-end overflow flag (cmd 0x1A sub 0x09).
pub fn get_ovf(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x1A, 0x09])
}

/// Read the SWR meter (cmd 0x15 sub 0x12).
pub fn get_swr(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x15, 0x12])
}

/// Read the transmit (PTT) status (cmd 0x1C sub 0x00).
pub fn get_transmit_status(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x1C, 0x00])
}

/// Read the antenna-tuner status (cmd 0x1C sub 0x01).
pub fn get_tune_status(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x1C, 0x01])
}

/// Read the preamp setting (cmd 0x16 sub 0x02).
pub fn get_preamp(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x16, 0x02])
}

/// Read the AGC time constant (cmd 0x16 sub 0x12).
pub fn get_agc(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x16, 0x12])
}

/// Read the PA drain voltage meter (cmd 0x15 sub 0x15).
pub fn get_vd(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x15, 0x15])
}

/// Read the tuning step (cmd 0x10, no sub).
pub fn get_tuning_step(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x10])
}

/// Read the RF gain level (cmd 0x14 sub 0x02).
pub fn get_rf_gain(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x14, 0x02])
}

/// Read the squelch level (cmd 0x14 sub 0x03).
pub fn get_squelch(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x14, 0x03])
}

/// Read the noise reduction level (cmd 0x14 sub 0x06).
pub fn get_nr_level(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x14, 0x06])
}

/// Read the noise reduction on/off state (cmd 0x16 sub 0x40).
pub fn get_nr_enabled(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x16, 0x40])
}

/// Read the split state (cmd 0x0F, no sub).
pub fn get_split(addr: u8) -> Vec<u8> {
    encode_frame(addr, &[0x0F])
}

/// Read a VFO frequency (cmd 0x25): `vfo` 0 = main, 1 = sub.
pub fn get_vfo_freq(addr: u8, vfo: u8) -> Vec<u8> {
    encode_frame(addr, &[0x25, vfo])
}

/// Read a VFO mode (cmd 0x26): `vfo` 0 = main, 1 = sub.
pub fn get_vfo_mode(addr: u8, vfo: u8) -> Vec<u8> {
    encode_frame(addr, &[0x26, vfo])
}

// ---------------------------------------------------------------
// Setters
// ---------------------------------------------------------------

/// Set TX power (cmd 0x14 sub 0x0A), percent scaled to the raw range.
pub fn set_power(addr: u8, percent: u8) -> Vec<u8> {
    let v = meter::raw_from_percent(percent);
    encode_frame(addr, &[0x14, 0x0A, (v >> 8) as u8, (v & 0xFF) as u8])
}

/// Set RF gain (cmd 0x14 sub 0x02).
pub fn set_rf_gain(addr: u8, percent: u8) -> Vec<u8> {
    let v = meter::raw_from_percent(percent);
    encode_frame(addr, &[0x14, 0x02, (v >> 8) as u8, (v & 0xFF) as u8])
}

/// Set squelch (cmd 0x14 sub 0x03).
pub fn set_squelch(addr: u8, percent: u8) -> Vec<u8> {
    let v = meter::raw_from_percent(percent);
    encode_frame(addr, &[0x14, 0x03, (v >> 8) as u8, (v & 0xFF) as u8])
}

/// Set noise reduction level (cmd 0x14 sub 0x06).
pub fn set_nr_level(addr: u8, percent: u8) -> Vec<u8> {
    let v = meter::raw_from_percent(percent);
    encode_frame(addr, &[0x14, 0x06, (v >> 8) as u8, (v & 0xFF) as u8])
}

/// Set a VFO frequency (cmd 0x25): `vfo` 0 = main, 1 = sub, 5-byte BCD.
pub fn set_vfo_freq(addr: u8, vfo: u8, freq_hz: u64) -> Vec<u8> {
    let b = encode_frequency(freq_hz);
    encode_frame(addr, &[0x25, vfo, b[0], b[1], b[2], b[3], b[4]])
}

/// Set operating mode and filter on the active VFO (cmd 0x06).
pub fn set_mode(addr: u8, mode_code: u8, filter_code: u8) -> Vec<u8> {
    encode_frame(addr, &[0x06, mode_code, filter_code])
}

/// Set the sub VFO mode, data-mode flag, and filter (cmd 0x26 sub 0x01).
pub fn set_sub_vfo_mode(addr: u8, mode_code: u8, data_mode: u8, filter_code: u8) -> Vec<u8> {
    encode_frame(addr, &[0x26, 0x01, mode_code, data_mode, filter_code])
}

/// Key or release PTT (cmd 0x1C sub 0x00).
pub fn set_ptt(addr: u8, on: bool) -> Vec<u8> {
    encode_frame(addr, &[0x1C, 0x00, u8::from(on)])
}

/// Start (0x02) or stop (0x01) the antenna tuner (cmd 0x1C sub 0x01).
pub fn set_tune(addr: u8, enable: bool) -> Vec<u8> {
    let b = if enable { 0x02 } else { 0x01 };
    encode_frame(addr, &[0x1C, 0x01, b])
}

/// Enable or disable data mode (cmd 0x1A sub 0x06). Enabling selects
/// filter 1 alongside, as the front panel does.
pub fn set_data_mode(addr: u8, on: bool) -> Vec<u8> {
    let b = u8::from(on);
    encode_frame(addr, &[0x1A, 0x06, b, b])
}

/// Set the preamp level 0..=2 (cmd 0x16 sub 0x02).
pub fn set_preamp(addr: u8, level: u8) -> Vec<u8> {
    encode_frame(addr, &[0x16, 0x02, level])
}

/// Set the AGC time constant code 1..=3 (cmd 0x16 sub 0x12).
pub fn set_agc(addr: u8, code: u8) -> Vec<u8> {
    encode_frame(addr, &[0x16, 0x12, code])
}

/// Switch noise reduction on or off (cmd 0x16 sub 0x40).
pub fn set_nr_enabled(addr: u8, on: bool) -> Vec<u8> {
    encode_frame(addr, &[0x16, 0x40, u8::from(on)])
}

/// Set the tuning step code 0..=13 (cmd 0x10).
pub fn set_tuning_step(addr: u8, code: u8) -> Vec<u8> {
    encode_frame(addr, &[0x10, code])
}

/// Select VFO A (0) or VFO B (1) (cmd 0x07).
pub fn set_vfo(addr: u8, vfo: u8) -> Vec<u8> {
    encode_frame(addr, &[0x07, vfo])
}

/// Set the split/duplex state (cmd 0x0F).
pub fn set_split(addr: u8, code: u8) -> Vec<u8> {
    encode_frame(addr, &[0x0F, code])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::DEFAULT_CIV_ADDR;

    const A: u8 = DEFAULT_CIV_ADDR;

    #[test]
    fn set_main_vfo_freq_wire_bytes() {
        assert_eq!(
            set_vfo_freq(A, 0, 14_250_000),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x25, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]
        );
    }

    #[test]
    fn tuning_step_wire_bytes() {
        assert_eq!(
            set_tuning_step(A, 0x00),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x10, 0x00, 0xFD]
        );
        assert_eq!(
            set_tuning_step(A, 0x0D),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x10, 0x0D, 0xFD]
        );
    }

    #[test]
    fn ptt_wire_bytes() {
        assert_eq!(
            set_ptt(A, false),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x1C, 0x00, 0x00, 0xFD]
        );
        assert_eq!(
            set_ptt(A, true),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x1C, 0x00, 0x01, 0xFD]
        );
    }

    #[test]
    fn tune_wire_bytes() {
        assert_eq!(
            set_tune(A, true),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x1C, 0x01, 0x02, 0xFD]
        );
        assert_eq!(
            set_tune(A, false),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x1C, 0x01, 0x01, 0xFD]
        );
    }

    #[test]
    fn power_full_scale() {
        // 100% encodes the full-scale raw value 0x0255.
        assert_eq!(
            set_power(A, 100),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x14, 0x0A, 0x02, 0x55, 0xFD]
        );
        assert_eq!(
            set_power(A, 0),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x14, 0x0A, 0x00, 0x00, 0xFD]
        );
    }

    #[test]
    fn getter_wire_bytes() {
        assert_eq!(get_split(A), vec![0xFE, 0xFE, 0xA4, 0xE0, 0x0F, 0xFD]);
        assert_eq!(
            get_s_meter(A),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x15, 0x02, 0xFD]
        );
        assert_eq!(
            get_vfo_freq(A, 1),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x25, 0x01, 0xFD]
        );
        assert_eq!(
            get_vfo_mode(A, 0),
            vec![0xFE, 0xFE, 0xA4, 0xE0, 0x26, 0x00, 0xFD]
        );
        assert_eq!(get_tuning_step(A), vec![0xFE, 0xFE, 0xA4, 0xE0, 0x10, 0xFD]);
    }

    #[test]
    fn split_codes_wire_bytes() {
        assert_eq!(set_split(A, 0x11)[5], 0x11);
        assert_eq!(set_split(A, 0x10)[5], 0x10);
    }
}
