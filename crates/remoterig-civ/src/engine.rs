//! The CI-V command engine.
//!
//! One [`CivEngine`] per radio connection. The engine owns the device-state
//! cache and the pending-command table behind a single mutex, issues
//! commands through a [`FrameSink`], and decodes every inbound frame from
//! the serial stream. Solicited replies clear their pending entry;
//! spontaneous frames update state and continue to the pass-through
//! consumer.
//!
//! The engine loop is a single selector over the status-poll tick, the
//! pending-add wakeup, the soonest retry deadline, inbound bytes, and
//! cancellation. Decoders do no I/O: they mutate state under the lock and
//! return reports and follow-up actions that the loop executes after
//! releasing it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use remoterig_core::error::{Error, Result};
use remoterig_core::{AgcMode, Filter, FrameSink, OperatingMode, ReportEvent, SplitMode, TuningStep, meter};

use crate::command::{self, CommandId};
use crate::frame;
use crate::state::{DeviceState, EngineState};

/// How often the engine polls meters and VFO frequencies.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long an unanswered command waits before retransmission.
pub const COMMAND_RETRY_TIMEOUT: Duration = Duration::from_millis(500);

/// Safety window after which a held PTT is forced off.
pub const PTT_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Safety window after which a running tune cycle is forced off.
pub const TUNE_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before polling transmit status after tune starts. The radio does
/// not report tune completion on its own.
const TUNE_POLL_DELAY: Duration = Duration::from_secs(1);

const REPORT_CHANNEL_CAPACITY: usize = 256;
const PASSTHROUGH_CHANNEL_CAPACITY: usize = 64;

/// What a decoder decided about one inbound frame.
struct DecodeOutcome {
    /// The pending command this reply answered, if any.
    absorbed: Option<CommandId>,
    /// Whether the raw bytes continue to the pass-through consumer.
    forward: bool,
}

impl DecodeOutcome {
    /// Spontaneous frame: state may have changed, bytes go through.
    fn forward() -> Self {
        DecodeOutcome {
            absorbed: None,
            forward: true,
        }
    }

    /// Reply matched against the pending table; forwarded only when
    /// nothing was waiting for it.
    fn absorbed(id: Option<CommandId>) -> Self {
        DecodeOutcome {
            forward: id.is_none(),
            absorbed: id,
        }
    }

    /// Undecodable short payload: suppressed while the command that would
    /// have produced it is still pending.
    fn suppressed_if(pending: bool) -> Self {
        DecodeOutcome {
            absorbed: None,
            forward: !pending,
        }
    }
}

/// Side effects a decoder wants executed once the state lock is released.
#[derive(Default)]
struct Effects {
    reports: Vec<ReportEvent>,
    followups: Vec<FollowUp>,
}

impl Effects {
    fn report(&mut self, event: ReportEvent) {
        self.reports.push(event);
    }
}

/// Deferred actions triggered by decoded frames.
enum FollowUp {
    /// The active VFO changed; the radio does not volunteer frequencies.
    GetBothVfoFreq,
    /// A transmit cycle ended; refresh the drain voltage.
    GetVd,
    /// Tune started; poll transmit status shortly since completion is
    /// never reported spontaneously.
    TuneStatusPollSoon,
}

struct Shared {
    link: Arc<dyn FrameSink>,
    civ_addr: u8,
    state: Mutex<EngineState>,
    pending_added: Notify,
    report_tx: broadcast::Sender<ReportEvent>,
    passthrough_tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
}

/// A running CI-V engine bound to one radio connection.
///
/// Constructed with [`CivEngine::start`], which performs the initial bulk
/// state read and spawns the engine loop. All command methods register the
/// command as pending before transmitting, so the loop retries it until
/// the matching reply arrives.
pub struct CivEngine {
    shared: Arc<Shared>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl CivEngine {
    /// Read the full device state from the radio and start the engine loop.
    ///
    /// `inbound` carries unwrapped CI-V payloads from the serial stream.
    /// Returns the engine and the pass-through receiver delivering every
    /// inbound message not absorbed by a pending command.
    pub async fn start(
        link: Arc<dyn FrameSink>,
        civ_addr: u8,
        inbound: mpsc::Receiver<Vec<u8>>,
    ) -> Result<(CivEngine, mpsc::Receiver<Vec<u8>>)> {
        let (report_tx, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        let (passthrough_tx, passthrough_rx) = mpsc::channel(PASSTHROUGH_CHANNEL_CAPACITY);

        let shared = Arc::new(Shared {
            link,
            civ_addr,
            state: Mutex::new(EngineState::new()),
            pending_added: Notify::new(),
            report_tx,
            passthrough_tx,
            cancel: CancellationToken::new(),
        });

        initial_sync(&shared).await?;

        let loop_task = tokio::spawn(engine_loop(Arc::clone(&shared), inbound));

        Ok((
            CivEngine {
                shared,
                loop_task: Mutex::new(Some(loop_task)),
            },
            passthrough_rx,
        ))
    }

    /// Subscribe to decoded state reports.
    pub fn subscribe(&self) -> broadcast::Receiver<ReportEvent> {
        self.shared.report_tx.subscribe()
    }

    /// A snapshot of the cached device state.
    pub async fn device_state(&self) -> DeviceState {
        self.shared.state.lock().await.device.clone()
    }

    /// Stop the engine loop and all armed timers. Idempotent.
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();
        {
            let mut st = self.shared.state.lock().await;
            if let Some(t) = st.ptt_timer.take() {
                t.abort();
            }
            if let Some(t) = st.tune_timer.take() {
                t.abort();
            }
        }
        if let Some(task) = self.loop_task.lock().await.take() {
            let _ = task.await;
        }
    }

    // -- level settings --------------------------------------------------

    /// Set TX power, 0-100.
    pub async fn set_power(&self, percent: u8) -> Result<()> {
        set_percent_cmd(&self.shared, CommandId::SetPower, percent).await
    }

    /// Nudge TX power up one percent; no-op at 100.
    pub async fn inc_power(&self) -> Result<()> {
        let cur = self.shared.state.lock().await.device.pwr_percent;
        if cur < 100 {
            self.set_power(cur + 1).await
        } else {
            Ok(())
        }
    }

    /// Nudge TX power down one percent; no-op at 0.
    pub async fn dec_power(&self) -> Result<()> {
        let cur = self.shared.state.lock().await.device.pwr_percent;
        if cur > 0 {
            self.set_power(cur - 1).await
        } else {
            Ok(())
        }
    }

    /// Set RF gain, 0-100.
    pub async fn set_rf_gain(&self, percent: u8) -> Result<()> {
        set_percent_cmd(&self.shared, CommandId::SetRfGain, percent).await
    }

    /// Nudge RF gain up one percent; no-op at 100.
    pub async fn inc_rf_gain(&self) -> Result<()> {
        let cur = self.shared.state.lock().await.device.rf_gain_percent;
        if cur < 100 {
            self.set_rf_gain(cur + 1).await
        } else {
            Ok(())
        }
    }

    /// Nudge RF gain down one percent; no-op at 0.
    pub async fn dec_rf_gain(&self) -> Result<()> {
        let cur = self.shared.state.lock().await.device.rf_gain_percent;
        if cur > 0 {
            self.set_rf_gain(cur - 1).await
        } else {
            Ok(())
        }
    }

    /// Set squelch, 0-100.
    pub async fn set_squelch(&self, percent: u8) -> Result<()> {
        set_percent_cmd(&self.shared, CommandId::SetSquelch, percent).await
    }

    /// Nudge squelch up one percent; no-op at 100.
    pub async fn inc_squelch(&self) -> Result<()> {
        let cur = self.shared.state.lock().await.device.sql_percent;
        if cur < 100 {
            self.set_squelch(cur + 1).await
        } else {
            Ok(())
        }
    }

    /// Nudge squelch down one percent; no-op at 0.
    pub async fn dec_squelch(&self) -> Result<()> {
        let cur = self.shared.state.lock().await.device.sql_percent;
        if cur > 0 {
            self.set_squelch(cur - 1).await
        } else {
            Ok(())
        }
    }

    /// Set the noise reduction level, switching NR on first if needed.
    pub async fn set_nr_level(&self, percent: u8) -> Result<()> {
        let enabled = self.shared.state.lock().await.device.nr_enabled;
        if !enabled {
            self.toggle_nr().await?;
        }
        set_percent_cmd(&self.shared, CommandId::SetNrLevel, percent).await
    }

    /// Nudge the NR level up one percent; no-op at 100.
    pub async fn inc_nr_level(&self) -> Result<()> {
        let cur = self.shared.state.lock().await.device.nr_percent;
        if cur < 100 {
            self.set_nr_level(cur + 1).await
        } else {
            Ok(())
        }
    }

    /// Nudge the NR level down one percent; no-op at 0.
    pub async fn dec_nr_level(&self) -> Result<()> {
        let cur = self.shared.state.lock().await.device.nr_percent;
        if cur > 0 {
            self.set_nr_level(cur - 1).await
        } else {
            Ok(())
        }
    }

    // -- frequency and band ----------------------------------------------

    /// Tune the main VFO.
    pub async fn set_main_vfo_freq(&self, freq_hz: u64) -> Result<()> {
        send_command(
            &self.shared,
            CommandId::SetMainVfoFreq,
            command::set_vfo_freq(self.shared.civ_addr, 0, freq_hz),
        )
        .await
    }

    /// Tune the sub VFO.
    pub async fn set_sub_vfo_freq(&self, freq_hz: u64) -> Result<()> {
        send_command(
            &self.shared,
            CommandId::SetSubVfoFreq,
            command::set_vfo_freq(self.shared.civ_addr, 1, freq_hz),
        )
        .await
    }

    /// Step the main VFO up by the current tuning step.
    pub async fn inc_freq(&self) -> Result<()> {
        let (freq, ts) = {
            let st = self.shared.state.lock().await;
            (st.device.freq, st.device.ts.hz())
        };
        self.set_main_vfo_freq(freq + ts).await
    }

    /// Step the main VFO down by the current tuning step.
    pub async fn dec_freq(&self) -> Result<()> {
        let (freq, ts) = {
            let st = self.shared.state.lock().await;
            (st.device.freq, st.device.ts.hz())
        };
        self.set_main_vfo_freq(freq.saturating_sub(ts)).await
    }

    /// Jump to the next band, restoring its last tuned frequency.
    pub async fn inc_band(&self) -> Result<()> {
        let f = {
            let st = self.shared.state.lock().await;
            st.device.bands.step_up(st.device.band_idx)
        };
        self.set_main_vfo_freq(f).await
    }

    /// Jump to the previous band, restoring its last tuned frequency.
    pub async fn dec_band(&self) -> Result<()> {
        let f = {
            let st = self.shared.state.lock().await;
            st.device.bands.step_down(st.device.band_idx)
        };
        self.set_main_vfo_freq(f).await
    }

    // -- mode and filter -------------------------------------------------

    /// Select the next operating mode, keeping the current filter.
    pub async fn inc_mode(&self) -> Result<()> {
        let (mode, filter) = {
            let mut st = self.shared.state.lock().await;
            st.device.mode = st.device.mode.next();
            (st.device.mode, st.device.filter)
        };
        self.set_mode_and_filter(mode, filter).await
    }

    /// Select the previous operating mode, keeping the current filter.
    pub async fn dec_mode(&self) -> Result<()> {
        let (mode, filter) = {
            let mut st = self.shared.state.lock().await;
            st.device.mode = st.device.mode.prev();
            (st.device.mode, st.device.filter)
        };
        self.set_mode_and_filter(mode, filter).await
    }

    /// Select the next IF filter, keeping the current mode.
    pub async fn inc_filter(&self) -> Result<()> {
        let (mode, filter) = {
            let mut st = self.shared.state.lock().await;
            st.device.filter = st.device.filter.next();
            (st.device.mode, st.device.filter)
        };
        self.set_mode_and_filter(mode, filter).await
    }

    /// Select the previous IF filter, keeping the current mode.
    pub async fn dec_filter(&self) -> Result<()> {
        let (mode, filter) = {
            let mut st = self.shared.state.lock().await;
            st.device.filter = st.device.filter.prev();
            (st.device.mode, st.device.filter)
        };
        self.set_mode_and_filter(mode, filter).await
    }

    /// Set operating mode and filter on the active VFO, then re-read both
    /// VFO modes (the radio echoes only the active one).
    pub async fn set_mode_and_filter(&self, mode: OperatingMode, filter: Filter) -> Result<()> {
        send_command(
            &self.shared,
            CommandId::SetMode,
            command::set_mode(self.shared.civ_addr, mode.code(), filter.code()),
        )
        .await?;
        get_both_vfo_mode(&self.shared).await
    }

    /// Set the sub VFO mode, data-mode flag, and filter.
    pub async fn set_sub_vfo_mode(
        &self,
        mode: OperatingMode,
        data_mode: bool,
        filter: Filter,
    ) -> Result<()> {
        send_command(
            &self.shared,
            CommandId::SetSubVfoMode,
            command::set_sub_vfo_mode(
                self.shared.civ_addr,
                mode.code(),
                u8::from(data_mode),
                filter.code(),
            ),
        )
        .await
    }

    /// Enable or disable data mode.
    pub async fn set_data_mode(&self, on: bool) -> Result<()> {
        send_command(
            &self.shared,
            CommandId::SetDataMode,
            command::set_data_mode(self.shared.civ_addr, on),
        )
        .await
    }

    /// Toggle data mode.
    pub async fn toggle_data_mode(&self) -> Result<()> {
        let on = self.shared.state.lock().await.device.data_mode;
        self.set_data_mode(!on).await
    }

    // -- transmit --------------------------------------------------------

    /// Key or release PTT. Keying arms the safety timer that forces
    /// transmit off if the radio never reports a release.
    pub async fn set_ptt(&self, on: bool) -> Result<()> {
        if on {
            let handle = arm_ptt_timer(&self.shared);
            let mut st = self.shared.state.lock().await;
            if let Some(old) = st.ptt_timer.take() {
                old.abort();
            }
            st.ptt_timer = Some(handle);
        }
        send_command(
            &self.shared,
            CommandId::SetPtt,
            command::set_ptt(self.shared.civ_addr, on),
        )
        .await
    }

    /// Start or stop the antenna tuner.
    ///
    /// A tune request while transmitting is silently dropped. Starting
    /// arms the tune safety timer.
    pub async fn set_tune(&self, enable: bool) -> Result<()> {
        {
            let st = self.shared.state.lock().await;
            if st.device.ptt {
                return Ok(());
            }
        }
        if enable {
            let handle = arm_tune_timer(&self.shared);
            let mut st = self.shared.state.lock().await;
            if let Some(old) = st.tune_timer.take() {
                old.abort();
            }
            st.tune_timer = Some(handle);
        }
        send_command(
            &self.shared,
            CommandId::SetTune,
            command::set_tune(self.shared.civ_addr, enable),
        )
        .await
    }

    /// Toggle the antenna tuner.
    pub async fn toggle_tune(&self) -> Result<()> {
        let tune = self.shared.state.lock().await.device.tune;
        self.set_tune(!tune).await
    }

    // -- front-panel toggles ---------------------------------------------

    /// Cycle the preamp off → 1 → 2 → off.
    pub async fn toggle_preamp(&self) -> Result<()> {
        let level = {
            let st = self.shared.state.lock().await;
            if st.device.preamp >= 2 {
                0
            } else {
                st.device.preamp + 1
            }
        };
        send_command(
            &self.shared,
            CommandId::SetPreamp,
            command::set_preamp(self.shared.civ_addr, level),
        )
        .await
    }

    /// Cycle the AGC time constant F → M → S → F.
    pub async fn toggle_agc(&self) -> Result<()> {
        let code = {
            let st = self.shared.state.lock().await;
            st.device.agc.toggled().code()
        };
        send_command(
            &self.shared,
            CommandId::SetAgc,
            command::set_agc(self.shared.civ_addr, code),
        )
        .await
    }

    /// Switch noise reduction on or off.
    pub async fn toggle_nr(&self) -> Result<()> {
        let on = !self.shared.state.lock().await.device.nr_enabled;
        send_command(
            &self.shared,
            CommandId::SetNrEnabled,
            command::set_nr_enabled(self.shared.civ_addr, on),
        )
        .await
    }

    // -- tuning step -----------------------------------------------------

    /// Set the tuning step by code.
    pub async fn set_tuning_step(&self, step: TuningStep) -> Result<()> {
        send_command(
            &self.shared,
            CommandId::SetTuningStep,
            command::set_tuning_step(self.shared.civ_addr, step.code()),
        )
        .await
    }

    /// Select the next tuning step, wrapping at the top of the table.
    pub async fn inc_ts(&self) -> Result<()> {
        let step = self.shared.state.lock().await.device.ts.next();
        self.set_tuning_step(step).await
    }

    /// Select the previous tuning step, wrapping at the bottom.
    pub async fn dec_ts(&self) -> Result<()> {
        let step = self.shared.state.lock().await.device.ts.prev();
        self.set_tuning_step(step).await
    }

    // -- VFO and split ---------------------------------------------------

    /// Select VFO A (0) or VFO B (1), then re-read both VFO modes.
    pub async fn set_vfo(&self, vfo: u8) -> Result<()> {
        send_command(
            &self.shared,
            CommandId::SetVfo,
            command::set_vfo(self.shared.civ_addr, vfo),
        )
        .await?;
        get_both_vfo_mode(&self.shared).await
    }

    /// Switch to the other VFO.
    pub async fn toggle_vfo(&self) -> Result<()> {
        let b_active = self.shared.state.lock().await.device.vfo_b_active;
        self.set_vfo(u8::from(!b_active)).await
    }

    /// Set the split/duplex state.
    pub async fn set_split(&self, mode: SplitMode) -> Result<()> {
        send_command(
            &self.shared,
            CommandId::SetSplit,
            command::set_split(self.shared.civ_addr, mode.code()),
        )
        .await
    }

    /// Cycle split off → on → DUP- → DUP+ → off.
    pub async fn toggle_split(&self) -> Result<()> {
        let mode = self.shared.state.lock().await.device.split.toggled();
        self.set_split(mode).await
    }

    // -- explicit reads --------------------------------------------------

    /// Request both VFO frequencies.
    pub async fn get_both_vfo_freq(&self) -> Result<()> {
        get_both_vfo_freq(&self.shared).await
    }

    /// Request both VFO modes.
    pub async fn get_both_vfo_mode(&self) -> Result<()> {
        get_both_vfo_mode(&self.shared).await
    }

    /// Request the transmit and tune status.
    pub async fn get_transmit_status(&self) -> Result<()> {
        get_transmit_status(&self.shared).await
    }
}

// ---------------------------------------------------------------------------
// Command transmission
// ---------------------------------------------------------------------------

/// Register `id` in the pending table and transmit its bytes.
///
/// Insertion refreshes an existing entry, wakes the engine loop so it can
/// recompute the retry deadline, and then sends outside the lock.
async fn send_command(shared: &Arc<Shared>, id: CommandId, bytes: Vec<u8>) -> Result<()> {
    {
        let mut st = shared.state.lock().await;
        st.mark_pending(id, bytes.clone());
    }
    shared.pending_added.notify_one();
    shared.link.send(&bytes).await
}

/// The four percent-scaled level setters share one wire shape.
async fn set_percent_cmd(shared: &Arc<Shared>, id: CommandId, percent: u8) -> Result<()> {
    if percent > 100 {
        return Err(Error::InvalidParameter(format!(
            "level {percent} out of range 0-100"
        )));
    }
    let bytes = match id {
        CommandId::SetPower => command::set_power(shared.civ_addr, percent),
        CommandId::SetRfGain => command::set_rf_gain(shared.civ_addr, percent),
        CommandId::SetSquelch => command::set_squelch(shared.civ_addr, percent),
        CommandId::SetNrLevel => command::set_nr_level(shared.civ_addr, percent),
        other => {
            return Err(Error::InvalidParameter(format!(
                "{} is not a level command",
                other.name()
            )));
        }
    };
    send_command(shared, id, bytes).await
}

async fn get_both_vfo_freq(shared: &Arc<Shared>) -> Result<()> {
    send_command(
        shared,
        CommandId::GetMainVfoFreq,
        command::get_vfo_freq(shared.civ_addr, 0),
    )
    .await?;
    send_command(
        shared,
        CommandId::GetSubVfoFreq,
        command::get_vfo_freq(shared.civ_addr, 1),
    )
    .await
}

async fn get_both_vfo_mode(shared: &Arc<Shared>) -> Result<()> {
    send_command(
        shared,
        CommandId::GetMainVfoMode,
        command::get_vfo_mode(shared.civ_addr, 0),
    )
    .await?;
    send_command(
        shared,
        CommandId::GetSubVfoMode,
        command::get_vfo_mode(shared.civ_addr, 1),
    )
    .await
}

async fn get_transmit_status(shared: &Arc<Shared>) -> Result<()> {
    send_command(
        shared,
        CommandId::GetTransmitStatus,
        command::get_transmit_status(shared.civ_addr),
    )
    .await?;
    send_command(
        shared,
        CommandId::GetTuneStatus,
        command::get_tune_status(shared.civ_addr),
    )
    .await
}

/// The initial bulk read: every cached field is requested once. A send
/// failure here is fatal for engine startup.
async fn initial_sync(shared: &Arc<Shared>) -> Result<()> {
    let a = shared.civ_addr;
    get_both_vfo_freq(shared).await?;
    get_both_vfo_mode(shared).await?;
    send_command(shared, CommandId::GetPower, command::get_power(a)).await?;
    get_transmit_status(shared).await?;
    send_command(shared, CommandId::GetPreamp, command::get_preamp(a)).await?;
    send_command(shared, CommandId::GetAgc, command::get_agc(a)).await?;
    send_command(shared, CommandId::GetVd, command::get_vd(a)).await?;
    send_command(shared, CommandId::GetSMeter, command::get_s_meter(a)).await?;
    send_command(shared, CommandId::GetOvf, command::get_ovf(a)).await?;
    send_command(shared, CommandId::GetSwr, command::get_swr(a)).await?;
    send_command(shared, CommandId::GetTuningStep, command::get_tuning_step(a)).await?;
    send_command(shared, CommandId::GetRfGain, command::get_rf_gain(a)).await?;
    send_command(shared, CommandId::GetSquelch, command::get_squelch(a)).await?;
    send_command(shared, CommandId::GetNrLevel, command::get_nr_level(a)).await?;
    send_command(shared, CommandId::GetNrEnabled, command::get_nr_enabled(a)).await?;
    send_command(shared, CommandId::GetSplit, command::get_split(a)).await
}

// ---------------------------------------------------------------------------
// Safety timers
// ---------------------------------------------------------------------------

fn arm_ptt_timer(shared: &Arc<Shared>) -> JoinHandle<()> {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        tokio::time::sleep(PTT_TIMEOUT).await;
        warn!("transmit held for the full safety window, keying off");
        let bytes = command::set_ptt(shared.civ_addr, false);
        let _ = send_command(&shared, CommandId::SetPtt, bytes).await;
    })
}

fn arm_tune_timer(shared: &Arc<Shared>) -> JoinHandle<()> {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        tokio::time::sleep(TUNE_TIMEOUT).await;
        warn!("tune cycle exceeded its window, stopping the tuner");
        let bytes = command::set_tune(shared.civ_addr, false);
        let _ = send_command(&shared, CommandId::SetTune, bytes).await;
    })
}

// ---------------------------------------------------------------------------
// Engine loop
// ---------------------------------------------------------------------------

async fn engine_loop(shared: Arc<Shared>, mut inbound: mpsc::Receiver<Vec<u8>>) {
    let mut poll = tokio::time::interval_at(
        Instant::now() + STATUS_POLL_INTERVAL,
        STATUS_POLL_INTERVAL,
    );

    loop {
        let next_retry = {
            let st = shared.state.lock().await;
            st.pending
                .values()
                .map(|p| p.sent_at + COMMAND_RETRY_TIMEOUT)
                .min()
        };

        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = poll.tick() => status_poll(&shared).await,
            // A new pending entry may move the soonest retry deadline.
            _ = shared.pending_added.notified() => {}
            _ = async {
                match next_retry {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => retry_overdue(&shared).await,
            msg = inbound.recv() => match msg {
                Some(data) => handle_inbound(&shared, &data).await,
                None => {
                    debug!("serial stream closed, stopping engine loop");
                    break;
                }
            },
        }
    }
}

/// One status-poll wake: SWR while transmitting, S-meter and OVF
/// otherwise, and VFO frequencies whenever none were seen this interval.
async fn status_poll(shared: &Arc<Shared>) {
    let mut to_send: Vec<(CommandId, Vec<u8>)> = Vec::new();
    {
        let st = shared.state.lock().await;
        let d = &st.device;
        let now = Instant::now();
        let stale = |at: Option<Instant>| {
            at.map_or(true, |at| now.duration_since(at) >= STATUS_POLL_INTERVAL)
        };

        if d.ptt || d.tune {
            if !st.any_pending(&[CommandId::GetSwr]) && stale(d.last_swr_received_at) {
                to_send.push((CommandId::GetSwr, command::get_swr(shared.civ_addr)));
            }
        } else {
            if !st.any_pending(&[CommandId::GetSMeter]) && stale(d.last_s_received_at) {
                to_send.push((CommandId::GetSMeter, command::get_s_meter(shared.civ_addr)));
            }
            if !st.any_pending(&[CommandId::GetOvf]) && stale(d.last_ovf_received_at) {
                to_send.push((CommandId::GetOvf, command::get_ovf(shared.civ_addr)));
            }
        }
        if !st.any_pending(&[CommandId::GetMainVfoFreq, CommandId::GetSubVfoFreq])
            && stale(d.last_vfo_freq_received_at)
        {
            to_send.push((
                CommandId::GetMainVfoFreq,
                command::get_vfo_freq(shared.civ_addr, 0),
            ));
            to_send.push((
                CommandId::GetSubVfoFreq,
                command::get_vfo_freq(shared.civ_addr, 1),
            ));
        }
    }
    for (id, bytes) in to_send {
        if let Err(e) = send_command(shared, id, bytes).await {
            debug!(error = %e, "status poll send failed");
        }
    }
}

/// Retransmit every pending command whose retry window elapsed, refreshing
/// its timestamp. The pending entry itself is untouched.
async fn retry_overdue(shared: &Arc<Shared>) {
    let mut resend: Vec<Vec<u8>> = Vec::new();
    {
        let mut st = shared.state.lock().await;
        let now = Instant::now();
        for (id, cmd) in st.pending.iter_mut() {
            if now.duration_since(cmd.sent_at) >= COMMAND_RETRY_TIMEOUT {
                debug!(command = id.name(), "retrying command send");
                cmd.sent_at = now;
                resend.push(cmd.bytes.clone());
            }
        }
    }
    for bytes in resend {
        if let Err(e) = shared.link.send(&bytes).await {
            debug!(error = %e, "command retry send failed");
        }
    }
}

async fn handle_inbound(shared: &Arc<Shared>, data: &[u8]) {
    // Not CI-V traffic: hand it through untouched.
    if !frame::is_civ_frame(data) {
        if shared.passthrough_tx.try_send(data.to_vec()).is_err() {
            trace!("pass-through consumer not keeping up, dropping message");
        }
        return;
    }

    let mut fx = Effects::default();
    let outcome = {
        let mut st = shared.state.lock().await;
        decode(&mut st, data, &mut fx)
    };

    if let Some(id) = outcome.absorbed {
        trace!(command = id.name(), "reply cleared pending command");
    }
    for event in fx.reports {
        let _ = shared.report_tx.send(event);
    }
    for followup in fx.followups {
        match followup {
            FollowUp::GetBothVfoFreq => {
                let _ = get_both_vfo_freq(shared).await;
            }
            FollowUp::GetVd => {
                let _ = send_command(
                    shared,
                    CommandId::GetVd,
                    command::get_vd(shared.civ_addr),
                )
                .await;
            }
            FollowUp::TuneStatusPollSoon => {
                let shared = Arc::clone(shared);
                tokio::spawn(async move {
                    tokio::time::sleep(TUNE_POLL_DELAY).await;
                    let _ = get_transmit_status(&shared).await;
                });
            }
        }
    }
    if outcome.forward && shared.passthrough_tx.try_send(data.to_vec()).is_err() {
        trace!("pass-through consumer not keeping up, dropping frame");
    }
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

/// Route one inbound frame to its decoder. Callers hold the state lock;
/// decoders mutate state and queue side effects, nothing more.
fn decode(st: &mut EngineState, data: &[u8], fx: &mut Effects) -> DecodeOutcome {
    let (Some(cmd), Some(d)) = (frame::command(data), frame::payload(data)) else {
        return DecodeOutcome::forward();
    };
    match cmd {
        0x01 | 0x04 | 0x06 => decode_mode(st, d, fx),
        0x07 => decode_vfo(st, d, fx),
        0x0F => decode_split(st, d, fx),
        0x10 => decode_ts(st, d, fx),
        0x14 => decode_levels(st, d, fx),
        0x15 => decode_meters(st, d, fx),
        0x16 => decode_func(st, d, fx),
        0x1A => decode_data_mode_ovf(st, d, fx),
        0x1C => decode_transmit_status(st, d, fx),
        0x25 => decode_vfo_freq(st, d, fx),
        0x26 => decode_vfo_mode(st, d, fx),
        _ => DecodeOutcome::forward(),
    }
}

fn decode_mode(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.is_empty() {
        return DecodeOutcome::suppressed_if(st.any_pending(&[CommandId::SetMode]));
    }
    if let Some(mode) = OperatingMode::from_code(d[0]) {
        st.device.mode = mode;
    }
    if d.len() > 1 {
        st.device.filter = Filter::from_code(d[1]);
    }
    fx.report(ReportEvent::Mode {
        mode: st.device.mode,
        data: st.device.data_mode,
        filter: st.device.filter,
    });
    DecodeOutcome::absorbed(st.absorb(&[CommandId::SetMode]))
}

fn decode_vfo(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.is_empty() {
        return DecodeOutcome::suppressed_if(st.any_pending(&[CommandId::SetVfo]));
    }
    st.device.vfo_b_active = d[0] == 1;
    let active = if st.device.vfo_b_active { "B" } else { "A" };
    debug!(vfo = active, "active vfo");
    fx.report(ReportEvent::Vfo {
        b_active: st.device.vfo_b_active,
    });
    if st.any_pending(&[CommandId::SetVfo]) {
        // The radio does not send frequencies after a VFO switch.
        fx.followups.push(FollowUp::GetBothVfoFreq);
        return DecodeOutcome::absorbed(st.absorb(&[CommandId::SetVfo]));
    }
    DecodeOutcome::forward()
}

fn decode_split(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.is_empty() {
        return DecodeOutcome::suppressed_if(
            st.any_pending(&[CommandId::GetSplit, CommandId::SetSplit]),
        );
    }
    st.device.split = SplitMode::from_code(d[0]);
    fx.report(ReportEvent::Split {
        mode: st.device.split,
    });
    DecodeOutcome::absorbed(st.absorb(&[CommandId::GetSplit, CommandId::SetSplit]))
}

fn decode_ts(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.is_empty() {
        return DecodeOutcome::suppressed_if(
            st.any_pending(&[CommandId::GetTuningStep, CommandId::SetTuningStep]),
        );
    }
    st.device.ts = TuningStep::from_code(d[0]);
    fx.report(ReportEvent::TuningStep {
        hz: st.device.ts.hz(),
    });
    DecodeOutcome::absorbed(st.absorb(&[CommandId::GetTuningStep, CommandId::SetTuningStep]))
}

fn decode_levels(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.is_empty() {
        return DecodeOutcome::forward();
    }
    let (get, set) = match d[0] {
        0x02 => (CommandId::GetRfGain, CommandId::SetRfGain),
        0x03 => (CommandId::GetSquelch, CommandId::SetSquelch),
        0x06 => (CommandId::GetNrLevel, CommandId::SetNrLevel),
        0x0A => (CommandId::GetPower, CommandId::SetPower),
        _ => return DecodeOutcome::forward(),
    };
    if d.len() < 3 {
        return DecodeOutcome::suppressed_if(st.any_pending(&[get, set]));
    }
    let raw = u16::from(d[1]) << 8 | u16::from(d[2]);
    let percent = meter::percent_from_raw(raw);
    match d[0] {
        0x02 => {
            st.device.rf_gain_percent = percent;
            fx.report(ReportEvent::RfGain { percent });
        }
        0x03 => {
            st.device.sql_percent = percent;
            fx.report(ReportEvent::Squelch { percent });
        }
        0x06 => {
            st.device.nr_percent = percent;
            fx.report(ReportEvent::NrLevel { percent });
        }
        _ => {
            st.device.pwr_percent = percent;
            fx.report(ReportEvent::TxPower { percent });
        }
    }
    DecodeOutcome::absorbed(st.absorb(&[get, set]))
}

fn decode_meters(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.is_empty() {
        return DecodeOutcome::forward();
    }
    match d[0] {
        0x02 => {
            if d.len() < 3 {
                return DecodeOutcome::suppressed_if(st.any_pending(&[CommandId::GetSMeter]));
            }
            let raw = u16::from(d[1]) << 8 | u16::from(d[2]);
            st.device.last_s_received_at = Some(Instant::now());
            fx.report(ReportEvent::SMeter {
                label: meter::s_meter_label(raw),
            });
            DecodeOutcome::absorbed(st.absorb(&[CommandId::GetSMeter]))
        }
        0x12 => {
            if d.len() < 3 {
                return DecodeOutcome::suppressed_if(st.any_pending(&[CommandId::GetSwr]));
            }
            let raw = u16::from(d[1]) << 8 | u16::from(d[2]);
            st.device.last_swr_received_at = Some(Instant::now());
            fx.report(ReportEvent::Swr {
                ratio: meter::swr_from_raw(raw),
            });
            DecodeOutcome::absorbed(st.absorb(&[CommandId::GetSwr]))
        }
        0x15 => {
            if d.len() < 3 {
                return DecodeOutcome::suppressed_if(st.any_pending(&[CommandId::GetVd]));
            }
            let raw = u16::from(d[1]) << 8 | u16::from(d[2]);
            fx.report(ReportEvent::DrainVoltage {
                volts: meter::vd_from_raw(raw),
            });
            DecodeOutcome::absorbed(st.absorb(&[CommandId::GetVd]))
        }
        _ => DecodeOutcome::forward(),
    }
}

fn decode_func(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.is_empty() {
        return DecodeOutcome::forward();
    }
    match d[0] {
        0x02 => {
            if d.len() < 2 {
                return DecodeOutcome::suppressed_if(
                    st.any_pending(&[CommandId::GetPreamp, CommandId::SetPreamp]),
                );
            }
            st.device.preamp = d[1];
            fx.report(ReportEvent::Preamp {
                level: st.device.preamp,
            });
            DecodeOutcome::absorbed(st.absorb(&[CommandId::GetPreamp, CommandId::SetPreamp]))
        }
        0x12 => {
            if d.len() < 2 {
                return DecodeOutcome::suppressed_if(
                    st.any_pending(&[CommandId::GetAgc, CommandId::SetAgc]),
                );
            }
            if let Some(agc) = AgcMode::from_code(d[1]) {
                st.device.agc = agc;
                fx.report(ReportEvent::Agc { mode: agc });
            }
            DecodeOutcome::absorbed(st.absorb(&[CommandId::GetAgc, CommandId::SetAgc]))
        }
        0x40 => {
            if d.len() < 2 {
                return DecodeOutcome::suppressed_if(
                    st.any_pending(&[CommandId::GetNrEnabled, CommandId::SetNrEnabled]),
                );
            }
            st.device.nr_enabled = d[1] == 1;
            fx.report(ReportEvent::NrEnabled {
                on: st.device.nr_enabled,
            });
            DecodeOutcome::absorbed(st.absorb(&[CommandId::GetNrEnabled, CommandId::SetNrEnabled]))
        }
        _ => DecodeOutcome::forward(),
    }
}

fn decode_data_mode_ovf(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.is_empty() {
        return DecodeOutcome::forward();
    }
    match d[0] {
        0x06 => {
            if d.len() < 3 {
                return DecodeOutcome::suppressed_if(st.any_pending(&[CommandId::SetDataMode]));
            }
            if d[1] == 1 {
                st.device.data_mode = true;
                st.device.filter = Filter::from_code(d[2]);
            } else {
                st.device.data_mode = false;
            }
            fx.report(ReportEvent::Mode {
                mode: st.device.mode,
                data: st.device.data_mode,
                filter: st.device.filter,
            });
            DecodeOutcome::absorbed(st.absorb(&[CommandId::SetDataMode]))
        }
        0x09 => {
            if d.len() < 2 {
                return DecodeOutcome::suppressed_if(st.any_pending(&[CommandId::GetOvf]));
            }
            st.device.last_ovf_received_at = Some(Instant::now());
            fx.report(ReportEvent::Overflow { on: d[1] != 0 });
            DecodeOutcome::absorbed(st.absorb(&[CommandId::GetOvf]))
        }
        _ => DecodeOutcome::forward(),
    }
}

fn decode_transmit_status(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.len() < 2 {
        return DecodeOutcome::suppressed_if(st.any_pending(&[
            CommandId::GetTuneStatus,
            CommandId::GetTransmitStatus,
            CommandId::SetPtt,
        ]));
    }
    match d[0] {
        0x00 => {
            if d[1] == 1 {
                st.device.ptt = true;
            } else if st.device.ptt {
                // PTT released: disarm the safety timer, refresh Vd.
                st.device.ptt = false;
                if let Some(t) = st.ptt_timer.take() {
                    t.abort();
                }
                fx.followups.push(FollowUp::GetVd);
            }
            fx.report(ReportEvent::Ptt {
                tx: st.device.ptt,
                tune: st.device.tune,
            });
            if let Some(id) = st.absorb(&[CommandId::SetPtt]) {
                return DecodeOutcome::absorbed(Some(id));
            }
        }
        0x01 => {
            if d[1] == 2 {
                st.device.tune = true;
                fx.followups.push(FollowUp::TuneStatusPollSoon);
            } else if st.device.tune {
                st.device.tune = false;
                if let Some(t) = st.tune_timer.take() {
                    t.abort();
                }
                fx.followups.push(FollowUp::GetVd);
            }
            fx.report(ReportEvent::Ptt {
                tx: st.device.ptt,
                tune: st.device.tune,
            });
            if let Some(id) = st.absorb(&[CommandId::SetTune]) {
                return DecodeOutcome::absorbed(Some(id));
            }
        }
        _ => {}
    }
    DecodeOutcome::absorbed(st.absorb(&[CommandId::GetTuneStatus, CommandId::GetTransmitStatus]))
}

fn decode_vfo_freq(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.len() < 2 {
        return DecodeOutcome::suppressed_if(st.any_pending(&[
            CommandId::GetMainVfoFreq,
            CommandId::GetSubVfoFreq,
            CommandId::SetSubVfoFreq,
        ]));
    }
    let f = frame::decode_frequency(&d[1..]);
    st.device.last_vfo_freq_received_at = Some(Instant::now());
    if d[0] == 0x01 {
        st.device.sub_freq = f;
        fx.report(ReportEvent::SubFrequency { hz: f });
        DecodeOutcome::absorbed(st.absorb(&[CommandId::GetSubVfoFreq, CommandId::SetSubVfoFreq]))
    } else {
        st.device.freq = f;
        st.device.band_idx = st.device.bands.update(f);
        fx.report(ReportEvent::Frequency { hz: f });
        DecodeOutcome::absorbed(st.absorb(&[CommandId::GetMainVfoFreq, CommandId::SetMainVfoFreq]))
    }
}

fn decode_vfo_mode(st: &mut EngineState, d: &[u8], fx: &mut Effects) -> DecodeOutcome {
    if d.len() < 2 {
        return DecodeOutcome::suppressed_if(st.any_pending(&[
            CommandId::GetMainVfoMode,
            CommandId::GetSubVfoMode,
            CommandId::SetSubVfoMode,
        ]));
    }
    let mode = OperatingMode::from_code(d[1]);
    let data_mode = d.len() > 2 && d[2] != 0;
    let filter = if d.len() > 3 {
        Some(Filter::from_code(d[3]))
    } else {
        None
    };
    if d[0] == 0x01 {
        if let Some(mode) = mode {
            st.device.sub_mode = mode;
        }
        st.device.sub_data_mode = data_mode;
        if let Some(filter) = filter {
            st.device.sub_filter = filter;
        }
        fx.report(ReportEvent::SubMode {
            mode: st.device.sub_mode,
            data: st.device.sub_data_mode,
            filter: st.device.sub_filter,
        });
        DecodeOutcome::absorbed(st.absorb(&[CommandId::GetSubVfoMode, CommandId::SetSubVfoMode]))
    } else {
        if let Some(mode) = mode {
            st.device.mode = mode;
        }
        st.device.data_mode = data_mode;
        if let Some(filter) = filter {
            st.device.filter = filter;
        }
        fx.report(ReportEvent::Mode {
            mode: st.device.mode,
            data: st.device.data_mode,
            filter: st.device.filter,
        });
        DecodeOutcome::absorbed(st.absorb(&[CommandId::GetMainVfoMode]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandId;
    use crate::frame::DEFAULT_CIV_ADDR;

    fn reply(body: &[u8]) -> Vec<u8> {
        // Radio-to-controller frame.
        let mut v = vec![0xFE, 0xFE, frame::CONTROLLER_ADDR, DEFAULT_CIV_ADDR];
        v.extend_from_slice(body);
        v.push(0xFD);
        v
    }

    #[test]
    fn decode_freq_reply_updates_state_and_band() {
        let mut st = EngineState::new();
        st.mark_pending(CommandId::SetMainVfoFreq, vec![]);
        let mut fx = Effects::default();

        let data = reply(&[0x25, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00]);
        let outcome = decode(&mut st, &data, &mut fx);

        assert_eq!(st.device.freq, 14_250_000);
        assert_eq!(st.device.band_idx, 4);
        assert_eq!(outcome.absorbed, Some(CommandId::SetMainVfoFreq));
        assert!(!outcome.forward);
        assert!(st.pending.is_empty());
        assert!(st.device.last_vfo_freq_received_at.is_some());
    }

    #[test]
    fn decode_spontaneous_freq_forwards() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        let data = reply(&[0x25, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00]);
        let outcome = decode(&mut st, &data, &mut fx);

        assert_eq!(st.device.freq, 14_250_000);
        assert!(outcome.forward);
        assert!(outcome.absorbed.is_none());
    }

    #[test]
    fn decode_sub_freq() {
        let mut st = EngineState::new();
        st.mark_pending(CommandId::GetSubVfoFreq, vec![]);
        let mut fx = Effects::default();

        let data = reply(&[0x25, 0x01, 0x00, 0x00, 0x00, 0x07, 0x00]);
        let outcome = decode(&mut st, &data, &mut fx);

        assert_eq!(st.device.sub_freq, 7_000_000);
        assert_eq!(outcome.absorbed, Some(CommandId::GetSubVfoFreq));
    }

    #[test]
    fn decode_s_meter_label() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        // Raw 0x0120 is half scale: S9 on the 18-step ladder.
        let data = reply(&[0x15, 0x02, 0x01, 0x20]);
        decode(&mut st, &data, &mut fx);

        assert!(st.device.last_s_received_at.is_some());
        assert!(matches!(
            fx.reports.as_slice(),
            [ReportEvent::SMeter { label }] if label == "S9"
        ));
    }

    #[test]
    fn decode_s_meter_mid_ladder() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        let data = reply(&[0x15, 0x02, 0x00, 0xA0]);
        decode(&mut st, &data, &mut fx);

        assert!(matches!(
            fx.reports.as_slice(),
            [ReportEvent::SMeter { label }] if label == "S5"
        ));
    }

    #[test]
    fn decode_ptt_release_queues_vd_refresh() {
        let mut st = EngineState::new();
        st.device.ptt = true;
        let mut fx = Effects::default();

        let data = reply(&[0x1C, 0x00, 0x00]);
        decode(&mut st, &data, &mut fx);

        assert!(!st.device.ptt);
        assert!(matches!(fx.followups.as_slice(), [FollowUp::GetVd]));
    }

    #[test]
    fn decode_tune_start_schedules_status_poll() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        let data = reply(&[0x1C, 0x01, 0x02]);
        decode(&mut st, &data, &mut fx);

        assert!(st.device.tune);
        assert!(matches!(
            fx.followups.as_slice(),
            [FollowUp::TuneStatusPollSoon]
        ));
    }

    #[test]
    fn decode_level_percent_bounds() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        // Full-scale power reading decodes to exactly 100 percent.
        let data = reply(&[0x14, 0x0A, 0x02, 0x55]);
        decode(&mut st, &data, &mut fx);
        assert_eq!(st.device.pwr_percent, 100);

        let data = reply(&[0x14, 0x0A, 0x00, 0x00]);
        decode(&mut st, &data, &mut fx);
        assert_eq!(st.device.pwr_percent, 0);
    }

    #[test]
    fn decode_split_states() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        for (code, want) in [
            (0x01u8, SplitMode::On),
            (0x11, SplitMode::DupMinus),
            (0x12, SplitMode::DupPlus),
            (0x00, SplitMode::Off),
        ] {
            let data = reply(&[0x0F, code]);
            decode(&mut st, &data, &mut fx);
            assert_eq!(st.device.split, want);
        }
    }

    #[test]
    fn decode_vfo_mode_main_and_sub() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        // Main VFO: USB, data mode on, FIL2.
        let data = reply(&[0x26, 0x00, 0x01, 0x01, 0x02]);
        decode(&mut st, &data, &mut fx);
        assert_eq!(st.device.mode, OperatingMode::Usb);
        assert!(st.device.data_mode);
        assert_eq!(st.device.filter, Filter::Fil2);

        // Sub VFO: CW, no data mode, FIL1.
        let data = reply(&[0x26, 0x01, 0x03, 0x00, 0x01]);
        decode(&mut st, &data, &mut fx);
        assert_eq!(st.device.sub_mode, OperatingMode::Cw);
        assert!(!st.device.sub_data_mode);
        assert_eq!(st.device.sub_filter, Filter::Fil1);
    }

    #[test]
    fn decode_unknown_command_forwards() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        let data = reply(&[0xFB]);
        let outcome = decode(&mut st, &data, &mut fx);
        assert!(outcome.forward);
    }

    #[test]
    fn decode_short_payload_suppressed_while_pending() {
        let mut st = EngineState::new();
        st.mark_pending(CommandId::SetMode, vec![]);
        let mut fx = Effects::default();

        // Mode reply with no payload: suppressed, pending entry stays.
        let data = reply(&[0x06]);
        let outcome = decode(&mut st, &data, &mut fx);
        assert!(!outcome.forward);
        assert!(st.pending.contains_key(&CommandId::SetMode));
    }

    #[test]
    fn decode_ovf_flag() {
        let mut st = EngineState::new();
        let mut fx = Effects::default();

        let data = reply(&[0x1A, 0x09, 0x01]);
        decode(&mut st, &data, &mut fx);
        assert!(st.device.last_ovf_received_at.is_some());
        assert!(matches!(
            fx.reports.as_slice(),
            [ReportEvent::Overflow { on: true }]
        ));
    }
}
