//! Core types shared by the session layer and the CI-V engine.
//!
//! The tables here (operating modes, IF filters, tuning steps) are fixed
//! properties of the radio's CI-V command set. Stepping helpers wrap around
//! at the table edges, matching the front-panel behavior.

use std::fmt;

/// Operating mode of the transceiver.
///
/// The ten modes selectable on the radio, in front-panel cycling order.
/// Each maps to its CI-V mode code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    /// Lower sideband voice.
    Lsb,
    /// Upper sideband voice.
    Usb,
    /// Amplitude modulation.
    Am,
    /// CW (morse).
    Cw,
    /// Radio teletype (FSK).
    Rtty,
    /// Frequency modulation.
    Fm,
    /// Wide FM (broadcast receive).
    Wfm,
    /// CW reverse sideband.
    CwR,
    /// RTTY reverse sideband.
    RttyR,
    /// D-STAR digital voice.
    Dv,
}

/// All operating modes in front-panel cycling order.
const ALL_MODES: &[OperatingMode] = &[
    OperatingMode::Lsb,
    OperatingMode::Usb,
    OperatingMode::Am,
    OperatingMode::Cw,
    OperatingMode::Rtty,
    OperatingMode::Fm,
    OperatingMode::Wfm,
    OperatingMode::CwR,
    OperatingMode::RttyR,
    OperatingMode::Dv,
];

impl OperatingMode {
    /// Returns the CI-V mode code for this mode.
    pub fn code(&self) -> u8 {
        match self {
            OperatingMode::Lsb => 0x00,
            OperatingMode::Usb => 0x01,
            OperatingMode::Am => 0x02,
            OperatingMode::Cw => 0x03,
            OperatingMode::Rtty => 0x04,
            OperatingMode::Fm => 0x05,
            OperatingMode::Wfm => 0x06,
            OperatingMode::CwR => 0x07,
            OperatingMode::RttyR => 0x08,
            OperatingMode::Dv => 0x17,
        }
    }

    /// Returns the mode for a CI-V mode code, or `None` for unknown codes.
    pub fn from_code(code: u8) -> Option<OperatingMode> {
        ALL_MODES.iter().copied().find(|m| m.code() == code)
    }

    /// Returns all modes in cycling order.
    pub fn all() -> &'static [OperatingMode] {
        ALL_MODES
    }

    /// Position of this mode in the cycling order.
    pub fn index(&self) -> usize {
        ALL_MODES.iter().position(|m| m == self).unwrap_or(0)
    }

    /// The next mode in cycling order, wrapping at the end.
    pub fn next(&self) -> OperatingMode {
        ALL_MODES[(self.index() + 1) % ALL_MODES.len()]
    }

    /// The previous mode in cycling order, wrapping at the start.
    pub fn prev(&self) -> OperatingMode {
        ALL_MODES[(self.index() + ALL_MODES.len() - 1) % ALL_MODES.len()]
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperatingMode::Lsb => "LSB",
            OperatingMode::Usb => "USB",
            OperatingMode::Am => "AM",
            OperatingMode::Cw => "CW",
            OperatingMode::Rtty => "RTTY",
            OperatingMode::Fm => "FM",
            OperatingMode::Wfm => "WFM",
            OperatingMode::CwR => "CW-R",
            OperatingMode::RttyR => "RTTY-R",
            OperatingMode::Dv => "DV",
        };
        write!(f, "{s}")
    }
}

/// IF filter selection (FIL1 widest through FIL3 narrowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Filter 1 (widest).
    Fil1,
    /// Filter 2.
    Fil2,
    /// Filter 3 (narrowest).
    Fil3,
}

const ALL_FILTERS: &[Filter] = &[Filter::Fil1, Filter::Fil2, Filter::Fil3];

impl Filter {
    /// Returns the CI-V filter code (1-based).
    pub fn code(&self) -> u8 {
        match self {
            Filter::Fil1 => 0x01,
            Filter::Fil2 => 0x02,
            Filter::Fil3 => 0x03,
        }
    }

    /// Returns the filter for a CI-V code. Unknown codes fall back to FIL1,
    /// matching the radio's behavior for out-of-range values.
    pub fn from_code(code: u8) -> Filter {
        ALL_FILTERS
            .iter()
            .copied()
            .find(|f| f.code() == code)
            .unwrap_or(Filter::Fil1)
    }

    /// Returns all filters in order.
    pub fn all() -> &'static [Filter] {
        ALL_FILTERS
    }

    /// Position of this filter in the table.
    pub fn index(&self) -> usize {
        ALL_FILTERS.iter().position(|f| f == self).unwrap_or(0)
    }

    /// The next filter, wrapping FIL3 back to FIL1.
    pub fn next(&self) -> Filter {
        ALL_FILTERS[(self.index() + 1) % ALL_FILTERS.len()]
    }

    /// The previous filter, wrapping FIL1 back to FIL3.
    pub fn prev(&self) -> Filter {
        ALL_FILTERS[(self.index() + ALL_FILTERS.len() - 1) % ALL_FILTERS.len()]
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Filter::Fil1 => "FIL1",
            Filter::Fil2 => "FIL2",
            Filter::Fil3 => "FIL3",
        };
        write!(f, "{s}")
    }
}

/// Split/duplex operation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SplitMode {
    /// Simplex: TX and RX on the same VFO.
    #[default]
    Off,
    /// Split: TX on the other VFO.
    On,
    /// Fixed negative duplex shift.
    DupMinus,
    /// Fixed positive duplex shift.
    DupPlus,
}

impl SplitMode {
    /// Returns the CI-V data byte for the set-split command.
    pub fn code(&self) -> u8 {
        match self {
            SplitMode::Off => 0x10,
            SplitMode::On => 0x01,
            SplitMode::DupMinus => 0x11,
            SplitMode::DupPlus => 0x12,
        }
    }

    /// Decodes the CI-V split status byte. Codes other than the three
    /// active states mean simplex.
    pub fn from_code(code: u8) -> SplitMode {
        match code {
            0x01 => SplitMode::On,
            0x11 => SplitMode::DupMinus,
            0x12 => SplitMode::DupPlus,
            _ => SplitMode::Off,
        }
    }

    /// The next state in the front-panel toggle cycle
    /// (off → on → DUP- → DUP+ → off).
    pub fn toggled(&self) -> SplitMode {
        match self {
            SplitMode::Off => SplitMode::On,
            SplitMode::On => SplitMode::DupMinus,
            SplitMode::DupMinus => SplitMode::DupPlus,
            SplitMode::DupPlus => SplitMode::Off,
        }
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SplitMode::Off => "",
            SplitMode::On => "SPLIT",
            SplitMode::DupMinus => "DUP-",
            SplitMode::DupPlus => "DUP+",
        };
        write!(f, "{s}")
    }
}

/// AGC time constant selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgcMode {
    /// Fast attack/release.
    Fast,
    /// Medium.
    Mid,
    /// Slow.
    Slow,
}

impl AgcMode {
    /// Returns the CI-V AGC code (1-based).
    pub fn code(&self) -> u8 {
        match self {
            AgcMode::Fast => 1,
            AgcMode::Mid => 2,
            AgcMode::Slow => 3,
        }
    }

    /// Returns the AGC mode for a CI-V code.
    pub fn from_code(code: u8) -> Option<AgcMode> {
        match code {
            1 => Some(AgcMode::Fast),
            2 => Some(AgcMode::Mid),
            3 => Some(AgcMode::Slow),
            _ => None,
        }
    }

    /// The next mode in the toggle cycle (F → M → S → F).
    pub fn toggled(&self) -> AgcMode {
        match self {
            AgcMode::Fast => AgcMode::Mid,
            AgcMode::Mid => AgcMode::Slow,
            AgcMode::Slow => AgcMode::Fast,
        }
    }
}

impl fmt::Display for AgcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgcMode::Fast => "F",
            AgcMode::Mid => "M",
            AgcMode::Slow => "S",
        };
        write!(f, "{s}")
    }
}

/// Tuning step, stored as the CI-V step code (0..=13).
///
/// Resolves to the step size in hertz via [`TuningStep::hz`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TuningStep(u8);

/// Step sizes in hertz, indexed by step code.
const TS_HZ: [u64; 14] = [
    1, 100, 500, 1000, 5000, 6250, 8330, 9000, 10000, 12500, 20000, 25000, 50000, 100000,
];

impl TuningStep {
    /// Highest valid step code.
    pub const MAX_CODE: u8 = 13;

    /// Creates a tuning step from its CI-V code. Out-of-range codes fall
    /// back to code 0 (1 Hz), matching the decode path for unknown values.
    pub fn from_code(code: u8) -> TuningStep {
        if code <= Self::MAX_CODE {
            TuningStep(code)
        } else {
            TuningStep(0)
        }
    }

    /// Returns the CI-V step code.
    pub fn code(&self) -> u8 {
        self.0
    }

    /// Returns the step size in hertz.
    pub fn hz(&self) -> u64 {
        TS_HZ[self.0 as usize]
    }

    /// The next step code, wrapping 13 back to 0.
    pub fn next(&self) -> TuningStep {
        if self.0 == Self::MAX_CODE {
            TuningStep(0)
        } else {
            TuningStep(self.0 + 1)
        }
    }

    /// The previous step code, wrapping 0 back to 13.
    pub fn prev(&self) -> TuningStep {
        if self.0 == 0 {
            TuningStep(Self::MAX_CODE)
        } else {
            TuningStep(self.0 - 1)
        }
    }
}

impl fmt::Display for TuningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_code_round_trip() {
        for &mode in OperatingMode::all() {
            assert_eq!(OperatingMode::from_code(mode.code()), Some(mode));
        }
    }

    #[test]
    fn mode_unknown_code() {
        assert_eq!(OperatingMode::from_code(0x42), None);
    }

    #[test]
    fn mode_cycle_wraps() {
        assert_eq!(OperatingMode::Dv.next(), OperatingMode::Lsb);
        assert_eq!(OperatingMode::Lsb.prev(), OperatingMode::Dv);
        assert_eq!(OperatingMode::Usb.next(), OperatingMode::Am);
    }

    #[test]
    fn mode_table_has_ten_entries() {
        assert_eq!(OperatingMode::all().len(), 10);
    }

    #[test]
    fn filter_code_round_trip() {
        for (i, &filter) in Filter::all().iter().enumerate() {
            assert_eq!(Filter::from_code(filter.code()), filter);
            assert_eq!(filter.index(), i);
        }
    }

    #[test]
    fn filter_unknown_code_falls_back() {
        assert_eq!(Filter::from_code(0x00), Filter::Fil1);
        assert_eq!(Filter::from_code(0x7f), Filter::Fil1);
    }

    #[test]
    fn filter_cycle_wraps() {
        assert_eq!(Filter::Fil3.next(), Filter::Fil1);
        assert_eq!(Filter::Fil1.prev(), Filter::Fil3);
    }

    #[test]
    fn split_toggle_cycle() {
        let mut mode = SplitMode::Off;
        let expected = [
            SplitMode::On,
            SplitMode::DupMinus,
            SplitMode::DupPlus,
            SplitMode::Off,
        ];
        for want in expected {
            mode = mode.toggled();
            assert_eq!(mode, want);
        }
    }

    #[test]
    fn split_codes() {
        assert_eq!(SplitMode::On.code(), 0x01);
        assert_eq!(SplitMode::DupMinus.code(), 0x11);
        assert_eq!(SplitMode::DupPlus.code(), 0x12);
        assert_eq!(SplitMode::Off.code(), 0x10);
        // Any unrecognized status byte decodes as simplex.
        assert_eq!(SplitMode::from_code(0x00), SplitMode::Off);
        assert_eq!(SplitMode::from_code(0x10), SplitMode::Off);
    }

    #[test]
    fn agc_toggle_cycle() {
        assert_eq!(AgcMode::Fast.toggled(), AgcMode::Mid);
        assert_eq!(AgcMode::Mid.toggled(), AgcMode::Slow);
        assert_eq!(AgcMode::Slow.toggled(), AgcMode::Fast);
    }

    #[test]
    fn tuning_step_table() {
        assert_eq!(TuningStep::from_code(0).hz(), 1);
        assert_eq!(TuningStep::from_code(1).hz(), 100);
        assert_eq!(TuningStep::from_code(6).hz(), 8330);
        assert_eq!(TuningStep::from_code(13).hz(), 100000);
    }

    #[test]
    fn tuning_step_wraps() {
        assert_eq!(TuningStep::from_code(13).next().code(), 0);
        assert_eq!(TuningStep::from_code(0).prev().code(), 13);
        assert_eq!(TuningStep::from_code(5).next().code(), 6);
    }

    #[test]
    fn tuning_step_out_of_range_code() {
        assert_eq!(TuningStep::from_code(14).code(), 0);
        assert_eq!(TuningStep::from_code(0xff).hz(), 1);
    }
}
