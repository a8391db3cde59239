//! The control stream: login, authentication, and stream management.
//!
//! The control stream owns one [`Session`] on the radio's control port.
//! After the session connect exchange it logs in with the XOR-encoded
//! credentials, captures the 6-byte auth ID from the reply, and walks
//! the two-step auth: first auth immediately, second auth one second
//! later. Once the radio confirms, it requests the serial and audio
//! sub-streams (guarded by a three-second timeout) and opens them with
//! the device name from the reply.
//!
//! A background loop then keeps the logical connection alive: reauth
//! every sixty seconds, a status log line every three, and a logout
//! with a grace window on disconnect.

use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use remoterig_core::error::{Error, Result};

use crate::audio::AudioStream;
use crate::packet;
use crate::serial::SerialStream;
use crate::session::Session;

/// Default control port of the radio.
pub const CONTROL_PORT: u16 = 50001;

/// Delay between the first and second auth packets.
const SECOND_AUTH_DELAY: Duration = Duration::from_secs(1);

/// Periodic reauthentication keeping the session alive.
const REAUTH_INTERVAL: Duration = Duration::from_secs(60);

/// Operational status log cadence.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(3);

/// How long the radio gets to answer the stream request.
const CONNINFO_TIMEOUT: Duration = Duration::from_secs(3);

/// How long the radio gets to answer the login packet.
const LOGIN_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace window after the logout packet before the session is finished.
const LOGOUT_GRACE: Duration = Duration::from_millis(3300);

/// Overall deadline for the auth walk and stream grant after login.
const STREAM_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the radio.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// The radio's IP address.
    pub radio_ip: IpAddr,
    /// Control port (50001 unless reconfigured on the radio).
    pub control_port: u16,
    /// Serial sub-stream port.
    pub serial_port: u16,
    /// Audio sub-stream port.
    pub audio_port: u16,
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl ControlConfig {
    /// Config with the radio's default ports.
    pub fn new(radio_ip: IpAddr, username: impl Into<String>, password: impl Into<String>) -> Self {
        ControlConfig {
            radio_ip,
            control_port: CONTROL_PORT,
            serial_port: crate::serial::SERIAL_PORT,
            audio_port: crate::audio::AUDIO_PORT,
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Outer and inner auth sequence counters plus the server-assigned token.
struct AuthState {
    seq: u16,
    inner_seq: u16,
    auth_id: [u8; 6],
}

/// A connected, authenticated control stream with its serial and audio
/// sub-streams running.
pub struct ControlStream {
    session: Arc<Session>,
    serial: Arc<SerialStream>,
    audio: Arc<AudioStream>,
    cancel: CancellationToken,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl ControlStream {
    /// Connect, authenticate, and open the serial and audio streams.
    ///
    /// Returns the control stream plus the inbound channels of the two
    /// sub-streams: unwrapped CI-V payloads from the serial stream and
    /// opaque PCM buffers from the audio stream. Fatal errors during and
    /// after the handshake are reported through `err_tx`.
    pub async fn connect(
        cfg: &ControlConfig,
        err_tx: mpsc::Sender<Error>,
    ) -> Result<(ControlStream, mpsc::Receiver<Vec<u8>>, mpsc::Receiver<Vec<u8>>)> {
        let addr = SocketAddr::new(cfg.radio_ip, cfg.control_port);
        let (session, mut read_rx) = Session::connect("control", addr, err_tx.clone()).await?;
        let session = Arc::new(session);

        let mut auth = AuthState {
            seq: 1,
            inner_seq: 0,
            auth_id: [0; 6],
        };

        // Login. The radio repeats the two random bytes as the auth-ID
        // prefix in its reply.
        let mut rand_id = [0u8; 2];
        rand::thread_rng().fill(&mut rand_id);
        let pkt = packet::login(
            auth.seq,
            auth.inner_seq,
            session.local_sid(),
            session.remote_sid(),
            rand_id,
            &cfg.username,
            &cfg.password,
        );
        session.send_twice(&pkt).await?;
        auth.seq = auth.seq.wrapping_add(1);
        auth.inner_seq = auth.inner_seq.wrapping_add(1);

        debug!("expecting login answer");
        let reply = wait_for_login_reply(&mut read_rx).await?;
        if reply.rejected {
            error!("radio rejected the credentials");
            return Err(Error::AuthenticationFailed);
        }
        auth.auth_id = reply.auth_id;
        send_auth(&session, &mut auth, packet::FIRST_AUTH_MAGIC).await?;
        debug!("login ok, first auth sent");

        // The loop walks the rest: second auth, stream request, reauth.
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let loop_task = tokio::spawn(control_loop(
            Arc::clone(&session),
            read_rx,
            auth,
            cfg.username.clone(),
            err_tx.clone(),
            cancel.clone(),
            ready_tx,
        ));

        let device_name = match tokio::time::timeout(STREAM_OPEN_TIMEOUT, ready_rx).await {
            Ok(Ok(name)) => name,
            Ok(Err(_)) => {
                cancel.cancel();
                return Err(Error::ConnectionLost);
            }
            Err(_) => {
                cancel.cancel();
                return Err(Error::Timeout);
            }
        };
        debug!(device = %device_name, "serial and audio granted");

        let (serial, serial_rx) =
            match SerialStream::open(cfg.radio_ip, cfg.serial_port, &device_name, err_tx.clone())
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    cancel.cancel();
                    return Err(e);
                }
            };
        let (audio, audio_rx) = match AudioStream::open(cfg.radio_ip, cfg.audio_port, err_tx).await
        {
            Ok(v) => v,
            Err(e) => {
                serial.close();
                cancel.cancel();
                return Err(e);
            }
        };

        Ok((
            ControlStream {
                session,
                serial,
                audio,
                cancel,
                loop_task: Mutex::new(Some(loop_task)),
            },
            serial_rx,
            audio_rx,
        ))
    }

    /// The serial sub-stream carrying CI-V traffic.
    pub fn serial(&self) -> Arc<SerialStream> {
        Arc::clone(&self.serial)
    }

    /// The audio sub-stream carrying opaque PCM.
    pub fn audio(&self) -> Arc<AudioStream> {
        Arc::clone(&self.audio)
    }

    /// Last measured control-session ping round-trip.
    pub async fn latency(&self) -> Duration {
        self.session.latency().await
    }

    /// Log out and tear the streams down. Idempotent.
    pub async fn disconnect(&self) {
        self.audio.close();
        self.serial.close();
        self.cancel.cancel();
        if let Some(task) = self.loop_task.lock().await.take() {
            let _ = task.await;
        }
        self.session.close();
    }
}

async fn send_auth(session: &Session, auth: &mut AuthState, magic: u8) -> Result<()> {
    let pkt = packet::auth(
        auth.seq,
        auth.inner_seq,
        session.local_sid(),
        session.remote_sid(),
        magic,
        &auth.auth_id,
    );
    auth.seq = auth.seq.wrapping_add(1);
    auth.inner_seq = auth.inner_seq.wrapping_add(1);
    session.send_twice(&pkt).await
}

/// Reads packets until the 96-byte login answer shows up, failing fast
/// on an auth rejection.
async fn wait_for_login_reply(
    read_rx: &mut mpsc::Receiver<Vec<u8>>,
) -> Result<packet::LoginReply> {
    let deadline = Instant::now() + LOGIN_REPLY_TIMEOUT;
    loop {
        let data = match tokio::time::timeout_at(deadline, read_rx.recv()).await {
            Ok(Some(data)) => data,
            Ok(None) => return Err(Error::ConnectionLost),
            Err(_) => return Err(Error::Timeout),
        };
        if packet::is_auth_rejected(&data) {
            return Err(Error::AuthenticationFailed);
        }
        if let Some(reply) = packet::parse_login_reply(&data) {
            return Ok(reply);
        }
    }
}

/// The single-selector control loop: one action per wake, no blocking
/// work inside.
async fn control_loop(
    session: Arc<Session>,
    mut read_rx: mpsc::Receiver<Vec<u8>>,
    mut auth: AuthState,
    username: String,
    err_tx: mpsc::Sender<Error>,
    cancel: CancellationToken,
    ready_tx: oneshot::Sender<String>,
) {
    let start_time = Instant::now();
    let mut ready_tx = Some(ready_tx);
    let mut opened = false;

    let mut second_auth: Option<Pin<Box<Sleep>>> = Some(Box::pin(sleep(SECOND_AUTH_DELAY)));
    let mut conninfo_guard: Option<Pin<Box<Sleep>>> = None;
    let mut reauth = tokio::time::interval_at(Instant::now() + REAUTH_INTERVAL, REAUTH_INTERVAL);
    let mut status_log =
        tokio::time::interval_at(Instant::now() + STATUS_LOG_INTERVAL, STATUS_LOG_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("sending logout");
                let _ = send_auth(&session, &mut auth, packet::SECOND_AUTH_MAGIC).await;
                sleep(LOGOUT_GRACE).await;
                break;
            }
            _ = async {
                match second_auth.as_mut() {
                    Some(s) => s.await,
                    None => std::future::pending().await,
                }
            } => {
                second_auth = None;
                if let Err(e) = send_auth(&session, &mut auth, packet::SECOND_AUTH_MAGIC).await {
                    let _ = err_tx.send(e).await;
                    break;
                }
                debug!("second auth sent");
            }
            _ = async {
                match conninfo_guard.as_mut() {
                    Some(s) => s.await,
                    None => std::future::pending().await,
                }
            } => {
                error!("serial and audio request timeout");
                let _ = err_tx.send(Error::ConnectionLost).await;
                break;
            }
            _ = reauth.tick() => {
                debug!("sending reauth");
                if let Err(e) = send_auth(&session, &mut auth, packet::SECOND_AUTH_MAGIC).await {
                    let _ = err_tx.send(e).await;
                    break;
                }
            }
            _ = status_log.tick() => {
                if opened {
                    let latency = session.latency().await;
                    debug!(
                        uptime = ?start_time.elapsed(),
                        latency = ?latency,
                        "control session running"
                    );
                }
            }
            msg = read_rx.recv() => {
                let Some(data) = msg else { break };
                if packet::is_auth_rejected(&data) {
                    error!("auth rejected");
                    let _ = err_tx.send(Error::AuthenticationFailed).await;
                    break;
                }
                if packet::is_auth_confirmed(&data) && !opened && conninfo_guard.is_none() {
                    debug!("auth ok, requesting serial and audio streams");
                    let pkt = packet::conninfo_request(
                        auth.seq,
                        auth.inner_seq,
                        session.local_sid(),
                        session.remote_sid(),
                        &auth.auth_id,
                        &username,
                    );
                    auth.seq = auth.seq.wrapping_add(1);
                    auth.inner_seq = auth.inner_seq.wrapping_add(1);
                    if let Err(e) = session.send_twice(&pkt).await {
                        let _ = err_tx.send(e).await;
                        break;
                    }
                    conninfo_guard = Some(Box::pin(sleep(CONNINFO_TIMEOUT)));
                }
                if let Some(info) = packet::parse_conninfo_reply(&data) {
                    if !opened && info.ready {
                        conninfo_guard = None;
                        opened = true;
                        debug!(device = %info.device_name, "stream request success");
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(info.device_name);
                        }
                    } else if !info.ready {
                        warn!("radio reports the streams busy");
                    }
                }
            }
        }
    }
}
