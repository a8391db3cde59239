//! Decoded radio state events.
//!
//! Events are emitted by the CI-V engine through a [`tokio::sync::broadcast`]
//! channel whenever a decoded reply (solicited or spontaneous) changes the
//! cached device state. Status displays and loggers subscribe to these
//! events instead of polling the state cache.

use crate::types::{AgcMode, Filter, OperatingMode, SplitMode};

/// An event emitted when decoded radio state changes.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events under heavy load (e.g. a fast S-meter
/// poll cycle).
#[derive(Debug, Clone)]
pub enum ReportEvent {
    /// Main VFO frequency in hertz.
    Frequency { hz: u64 },

    /// Sub VFO frequency in hertz.
    SubFrequency { hz: u64 },

    /// Main VFO operating mode, data-mode flag, and IF filter.
    Mode {
        mode: OperatingMode,
        data: bool,
        filter: Filter,
    },

    /// Sub VFO operating mode, data-mode flag, and IF filter.
    SubMode {
        mode: OperatingMode,
        data: bool,
        filter: Filter,
    },

    /// Which VFO is the transmitting one.
    Vfo { b_active: bool },

    /// Split/duplex state.
    Split { mode: SplitMode },

    /// Tuning step in hertz.
    TuningStep { hz: u64 },

    /// Front-end overflow flag.
    Overflow { on: bool },

    /// S-meter reading, already formatted per the S ladder (e.g. "S9+20").
    SMeter { label: String },

    /// SWR reading during transmit (e.g. 1.5 means 1.5:1).
    Swr { ratio: f64 },

    /// PA drain voltage in volts.
    DrainVoltage { volts: f64 },

    /// Transmit power setting, 0-100.
    TxPower { percent: u8 },

    /// RF gain setting, 0-100.
    RfGain { percent: u8 },

    /// Squelch setting, 0-100.
    Squelch { percent: u8 },

    /// Noise reduction level, 0-100.
    NrLevel { percent: u8 },

    /// Noise reduction on/off.
    NrEnabled { on: bool },

    /// Preamp level (0 = off, 1, 2).
    Preamp { level: u8 },

    /// AGC time constant selection.
    Agc { mode: AgcMode },

    /// Transmit state: PTT and antenna-tuner activity.
    Ptt { tx: bool, tune: bool },
}
