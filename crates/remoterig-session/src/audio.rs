//! The audio stream: opaque PCM over the session layer.
//!
//! Audio shares the session machinery with control and serial. The
//! stream carries payloads without interpreting them; codec handling,
//! capture, and playback belong to the application.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use tokio::sync::mpsc;

use remoterig_core::error::{Error, Result};

use crate::packet;
use crate::session::Session;

/// Default audio port of the radio.
pub const AUDIO_PORT: u16 = 50003;

const PCM_CHANNEL_CAPACITY: usize = 256;

/// A connected audio stream.
pub struct AudioStream {
    session: Arc<Session>,
    data_seq: AtomicU16,
}

impl AudioStream {
    /// Connect the audio session.
    ///
    /// Returns the stream and the channel delivering inbound PCM
    /// payloads, still encoded however the radio encodes them.
    pub async fn open(
        radio_ip: IpAddr,
        port: u16,
        err_tx: mpsc::Sender<Error>,
    ) -> Result<(Arc<AudioStream>, mpsc::Receiver<Vec<u8>>)> {
        let addr = SocketAddr::new(radio_ip, port);
        let (session, mut read_rx) = Session::connect("audio", addr, err_tx).await?;
        let session = Arc::new(session);

        let (pcm_tx, pcm_rx) = mpsc::channel(PCM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(pkt) = read_rx.recv().await {
                if let Some(payload) = packet::parse_audio_data(&pkt) {
                    if pcm_tx.send(payload.to_vec()).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok((
            Arc::new(AudioStream {
                session,
                data_seq: AtomicU16::new(0),
            }),
            pcm_rx,
        ))
    }

    /// Wrap one PCM buffer in an audio data packet and transmit it.
    pub async fn send_pcm(&self, data: &[u8]) -> Result<()> {
        if data.len() > u16::MAX as usize {
            return Err(Error::InvalidParameter("audio buffer too large".into()));
        }
        let p = packet::audio_data(
            self.session.next_seq(),
            self.session.local_sid(),
            self.session.remote_sid(),
            self.data_seq.fetch_add(1, Ordering::SeqCst),
            data,
        );
        self.session.send(&p).await
    }

    /// Stop the underlying session. Idempotent.
    pub fn close(&self) {
        self.session.close();
    }
}
