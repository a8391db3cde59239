//! remoterig: a userland gateway for the IC-705's network protocol.
//!
//! The radio exposes control, serial (CI-V), and audio streams over UDP,
//! guarded by a session protocol with its own handshake, keepalive, and
//! authentication. This facade crate wires the pieces together:
//!
//! - [`remoterig_session`] runs the session layer and the three streams.
//! - [`remoterig_civ`] drives the radio's state over the serial stream.
//! - [`remoterig_core`] carries the shared types and the report events.
//!
//! # Example
//!
//! ```no_run
//! use remoterig::{Gateway, GatewayConfig};
//!
//! # async fn example() -> remoterig::Result<()> {
//! let cfg = GatewayConfig::new("192.168.1.30".parse().unwrap(), "beer", "beerbeer");
//! let mut gateway = Gateway::connect(cfg).await?;
//!
//! let mut reports = gateway.reports();
//! gateway.engine().set_main_vfo_freq(14_250_000).await?;
//! while let Ok(event) = reports.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use remoterig_civ::CivEngine;
use remoterig_session::{AudioStream, ControlConfig, ControlStream, SerialStream};

pub use remoterig_civ as civ;
pub use remoterig_session as session;

pub use remoterig_civ::{CommandId, DeviceState};
pub use remoterig_core::{
    AgcMode, BandTable, Error, Filter, FrameSink, OperatingMode, ReportEvent, Result, SplitMode,
    TuningStep,
};

/// Everything the gateway needs to reach and drive one radio.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// The radio's IP address.
    pub radio_ip: IpAddr,
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// CI-V address byte of the radio (0xA4 unless reconfigured).
    pub civ_address: u8,
    /// Control port.
    pub control_port: u16,
    /// Serial port.
    pub serial_port: u16,
    /// Audio port.
    pub audio_port: u16,
}

impl GatewayConfig {
    /// Config with the radio's default ports and CI-V address.
    pub fn new(radio_ip: IpAddr, username: impl Into<String>, password: impl Into<String>) -> Self {
        GatewayConfig {
            radio_ip,
            username: username.into(),
            password: password.into(),
            civ_address: remoterig_civ::frame::DEFAULT_CIV_ADDR,
            control_port: remoterig_session::CONTROL_PORT,
            serial_port: remoterig_session::SERIAL_PORT,
            audio_port: remoterig_session::AUDIO_PORT,
        }
    }
}

/// One connected radio: the authenticated control session, the serial
/// and audio streams, and the CI-V engine running on top.
pub struct Gateway {
    control: ControlStream,
    engine: CivEngine,
    audio_rx: Option<mpsc::Receiver<Vec<u8>>>,
    passthrough_rx: Option<mpsc::Receiver<Vec<u8>>>,
    err_rx: Option<mpsc::Receiver<Error>>,
}

impl Gateway {
    /// Connect and authenticate, open the sub-streams, and run the
    /// engine's initial state read.
    pub async fn connect(cfg: GatewayConfig) -> Result<Gateway> {
        let (err_tx, err_rx) = mpsc::channel(16);
        let control_cfg = ControlConfig {
            radio_ip: cfg.radio_ip,
            control_port: cfg.control_port,
            serial_port: cfg.serial_port,
            audio_port: cfg.audio_port,
            username: cfg.username,
            password: cfg.password,
        };
        let (control, serial_rx, audio_rx) = ControlStream::connect(&control_cfg, err_tx).await?;

        let sink: Arc<dyn FrameSink> = control.serial();
        let (engine, passthrough_rx) = CivEngine::start(sink, cfg.civ_address, serial_rx).await?;
        debug!("gateway connected");

        Ok(Gateway {
            control,
            engine,
            audio_rx: Some(audio_rx),
            passthrough_rx: Some(passthrough_rx),
            err_rx: Some(err_rx),
        })
    }

    /// The CI-V engine driving the radio's front-panel state.
    pub fn engine(&self) -> &CivEngine {
        &self.engine
    }

    /// Subscribe to decoded state reports.
    pub fn reports(&self) -> broadcast::Receiver<ReportEvent> {
        self.engine.subscribe()
    }

    /// The serial stream, for the external pass-through consumer's
    /// outbound direction.
    pub fn serial(&self) -> Arc<SerialStream> {
        self.control.serial()
    }

    /// The audio stream's outbound direction.
    pub fn audio(&self) -> Arc<AudioStream> {
        self.control.audio()
    }

    /// Inbound CI-V traffic no pending command absorbed, for the
    /// external serial consumer. Yields `None` after the first call.
    pub fn take_passthrough(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.passthrough_rx.take()
    }

    /// Inbound audio payloads. Yields `None` after the first call.
    pub fn take_audio(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.audio_rx.take()
    }

    /// Fatal session errors. Receiving one means the gateway should be
    /// shut down. Yields `None` after the first call.
    pub fn take_errors(&mut self) -> Option<mpsc::Receiver<Error>> {
        self.err_rx.take()
    }

    /// Orderly teardown: stop the engine, log out, close the sessions.
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
        self.control.disconnect().await;
    }
}
