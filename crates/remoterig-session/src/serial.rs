//! The serial stream: CI-V bytes tunnelled over the session layer.
//!
//! The stream connects its own session on the radio's serial port, sends
//! the stream-open request with the device name learned from the control
//! handshake, and then wraps every outbound CI-V message in a sequenced
//! serial data packet. Inbound serial data packets are unwrapped and
//! delivered on the channel returned by [`SerialStream::open`]; the CI-V
//! engine consumes that channel and transmits through the [`FrameSink`]
//! implementation.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use remoterig_core::error::{Error, Result};
use remoterig_core::link::FrameSink;

use crate::packet;
use crate::session::Session;

/// Default serial port of the radio.
pub const SERIAL_PORT: u16 = 50002;

const CIV_CHANNEL_CAPACITY: usize = 64;

/// A connected serial stream.
pub struct SerialStream {
    session: Arc<Session>,
    data_seq: AtomicU16,
}

impl SerialStream {
    /// Connect the serial session and open the stream for `device_name`.
    ///
    /// Returns the stream and the channel delivering unwrapped inbound
    /// CI-V payloads.
    pub async fn open(
        radio_ip: IpAddr,
        port: u16,
        device_name: &str,
        err_tx: mpsc::Sender<Error>,
    ) -> Result<(Arc<SerialStream>, mpsc::Receiver<Vec<u8>>)> {
        let addr = SocketAddr::new(radio_ip, port);
        let (session, mut read_rx) = Session::connect("serial", addr, err_tx).await?;
        let session = Arc::new(session);

        let open = packet::serial_open(
            session.next_seq(),
            session.local_sid(),
            session.remote_sid(),
            device_name,
        );
        session.send_twice(&open).await?;
        debug!(device = %device_name, "serial stream opened");

        let (civ_tx, civ_rx) = mpsc::channel(CIV_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(pkt) = read_rx.recv().await {
                if let Some(payload) = packet::parse_serial_data(&pkt) {
                    if civ_tx.send(payload.to_vec()).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok((
            Arc::new(SerialStream {
                session,
                data_seq: AtomicU16::new(0),
            }),
            civ_rx,
        ))
    }

    /// Wrap one CI-V message in a serial data packet and transmit it.
    pub async fn send_civ(&self, data: &[u8]) -> Result<()> {
        let p = packet::serial_data(
            self.session.next_seq(),
            self.session.local_sid(),
            self.session.remote_sid(),
            self.data_seq.fetch_add(1, Ordering::SeqCst),
            data,
        );
        self.session.send(&p).await
    }

    /// Transmit bytes from the external serial consumer, refusing
    /// anything that is not sentinel-framed CI-V.
    pub async fn send_passthrough(&self, data: &[u8]) -> Result<()> {
        if !is_civ_framed(data) {
            return Err(Error::InvalidParameter(
                "pass-through data is not a framed CI-V message".into(),
            ));
        }
        self.send_civ(data).await
    }

    /// Stop the underlying session. Idempotent.
    pub fn close(&self) {
        self.session.close();
    }
}

#[async_trait]
impl FrameSink for SerialStream {
    async fn send(&self, data: &[u8]) -> Result<()> {
        self.send_civ(data).await
    }
}

/// Sentinel check for pass-through traffic: double preamble, terminator,
/// and a plausible minimum length.
fn is_civ_framed(data: &[u8]) -> bool {
    data.len() >= 6 && data[0] == 0xFE && data[1] == 0xFE && data[data.len() - 1] == 0xFD
}
