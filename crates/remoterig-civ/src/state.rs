//! Cached device state and the pending-command table.
//!
//! The engine keeps one [`DeviceState`] per radio connection, populated by
//! the initial bulk read burst and mutated solely by the decode path. The
//! pending table is a single associative container keyed by
//! [`CommandId`]: re-inserting a command refreshes its timestamp instead
//! of duplicating the entry, so retransmission is idempotent by
//! construction.

use std::collections::HashMap;

use tokio::time::Instant;

use remoterig_core::{AgcMode, BandTable, Filter, OperatingMode, SplitMode, TuningStep};

use crate::command::CommandId;

/// A command in flight: its wire bytes and when it was last transmitted.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    /// The exact bytes on the wire; retries resend these unchanged.
    pub bytes: Vec<u8>,
    /// When the command was last sent. Refreshed on every retry.
    pub sent_at: Instant,
}

/// Decoded state of the radio, updated from solicited and spontaneous
/// replies alike.
#[derive(Debug, Clone)]
pub struct DeviceState {
    /// Main VFO frequency in hertz.
    pub freq: u64,
    /// Sub VFO frequency in hertz.
    pub sub_freq: u64,
    /// Whether VFO B is the transmitting VFO.
    pub vfo_b_active: bool,

    /// Main VFO operating mode.
    pub mode: OperatingMode,
    /// Main VFO data-mode flag.
    pub data_mode: bool,
    /// Main VFO IF filter.
    pub filter: Filter,
    /// Sub VFO operating mode.
    pub sub_mode: OperatingMode,
    /// Sub VFO data-mode flag.
    pub sub_data_mode: bool,
    /// Sub VFO IF filter.
    pub sub_filter: Filter,

    /// Index of the band containing `freq` in the band table.
    pub band_idx: usize,
    /// Band table with per-band last-tuned-frequency memory.
    pub bands: BandTable,

    /// TX power setting, 0-100.
    pub pwr_percent: u8,
    /// RF gain setting, 0-100.
    pub rf_gain_percent: u8,
    /// Squelch setting, 0-100.
    pub sql_percent: u8,
    /// Noise reduction level, 0-100.
    pub nr_percent: u8,
    /// Noise reduction on/off.
    pub nr_enabled: bool,
    /// Preamp level 0..=2.
    pub preamp: u8,
    /// AGC time constant.
    pub agc: AgcMode,
    /// Tuning step.
    pub ts: TuningStep,

    /// Transmitting.
    pub ptt: bool,
    /// Antenna tuner running.
    pub tune: bool,
    /// Split/duplex state.
    pub split: SplitMode,

    /// Last time an S-meter reading was decoded.
    pub last_s_received_at: Option<Instant>,
    /// Last time an OVF flag was decoded.
    pub last_ovf_received_at: Option<Instant>,
    /// Last time an SWR reading was decoded.
    pub last_swr_received_at: Option<Instant>,
    /// Last time a VFO frequency was decoded.
    pub last_vfo_freq_received_at: Option<Instant>,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState {
            freq: 0,
            sub_freq: 0,
            vfo_b_active: false,
            mode: OperatingMode::Lsb,
            data_mode: false,
            filter: Filter::Fil1,
            sub_mode: OperatingMode::Lsb,
            sub_data_mode: false,
            sub_filter: Filter::Fil1,
            band_idx: remoterig_core::GENE_BAND_IDX,
            bands: BandTable::new(),
            pwr_percent: 0,
            rf_gain_percent: 0,
            sql_percent: 0,
            nr_percent: 0,
            nr_enabled: false,
            preamp: 0,
            agc: AgcMode::Fast,
            ts: TuningStep::default(),
            ptt: false,
            tune: false,
            split: SplitMode::Off,
            last_s_received_at: None,
            last_ovf_received_at: None,
            last_swr_received_at: None,
            last_vfo_freq_received_at: None,
        }
    }
}

/// Everything behind the engine's single mutex: the device state, the
/// pending table, and the two safety timers.
pub(crate) struct EngineState {
    pub device: DeviceState,
    pub pending: HashMap<CommandId, PendingCommand>,
    /// Forces PTT off if armed and not cancelled by an observed release.
    pub ptt_timer: Option<tokio::task::JoinHandle<()>>,
    /// Forces the tuner off if armed and not cancelled by an observed stop.
    pub tune_timer: Option<tokio::task::JoinHandle<()>>,
}

impl EngineState {
    pub fn new() -> Self {
        EngineState {
            device: DeviceState::default(),
            pending: HashMap::new(),
            ptt_timer: None,
            tune_timer: None,
        }
    }

    /// Registers `id` as pending with fresh bytes and timestamp. An
    /// existing entry is refreshed, never duplicated.
    pub fn mark_pending(&mut self, id: CommandId, bytes: Vec<u8>) {
        self.pending.insert(
            id,
            PendingCommand {
                bytes,
                sent_at: Instant::now(),
            },
        );
    }

    /// Removes the first of `candidates` that is pending, returning it.
    ///
    /// Decoders call this with the get/set commands a reply can answer;
    /// `Some` means the reply was solicited and must not be forwarded to
    /// the pass-through consumer.
    pub fn absorb(&mut self, candidates: &[CommandId]) -> Option<CommandId> {
        for &id in candidates {
            if self.pending.remove(&id).is_some() {
                return Some(id);
            }
        }
        None
    }

    /// True if any of `candidates` is pending.
    pub fn any_pending(&self, candidates: &[CommandId]) -> bool {
        candidates.iter().any(|id| self.pending.contains_key(id))
    }
}
