//! The shared session machinery under the control, serial, and audio
//! streams.
//!
//! A [`Session`] owns one [`UdpEndpoint`] and runs three background
//! tasks once connected: a reader that routes inbound packets, a 100 ms
//! idle keepalive ticker, and a 100 ms sequenced ping. Packets that are
//! not part of the session machinery are delivered to the stream through
//! the read channel returned by [`Session::connect`].
//!
//! Loss of more than one ping sequence step is logged and tolerated;
//! five receive timeouts in a row are fatal and reported through the
//! error sink.

use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use remoterig_core::error::{Error, Result};

use crate::packet;
use crate::udp::{MAX_DATAGRAM, UdpEndpoint};

/// How often the connect request is retransmitted while waiting for the
/// accept.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Overall deadline for the connect exchange.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle keepalive period.
const IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Sequenced ping period.
const PING_INTERVAL: Duration = Duration::from_millis(100);

/// Receive timeouts in a row that kill the session.
const MAX_CONSECUTIVE_TIMEOUTS: u32 = 5;

const READ_CHANNEL_CAPACITY: usize = 64;

struct PingState {
    send_seq: u16,
    last_peer_seq: Option<u16>,
    /// Sequence and send time of the newest unanswered request.
    outstanding: Option<(u16, Instant)>,
    latency: Duration,
}

pub(crate) struct SessionInner {
    name: &'static str,
    endpoint: UdpEndpoint,
    local_sid: u32,
    remote_sid: u32,
    /// Outgoing sequence shared by keepalives and data packets.
    seq: AtomicU16,
    /// Serializes outbound datagrams on the wire.
    send_lock: Mutex<()>,
    ping: Mutex<PingState>,
    err_tx: mpsc::Sender<Error>,
    cancel: CancellationToken,
}

impl SessionInner {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let _guard = self.send_lock.lock().await;
        self.endpoint.send(data).await
    }
}

/// One connected session: control, serial, and audio each run one.
pub struct Session {
    inner: Arc<SessionInner>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Perform the connect exchange with the radio and start the session
    /// machinery.
    ///
    /// Returns the session and the channel delivering every inbound
    /// packet that is not handled internally (keepalives and pings are).
    pub async fn connect(
        name: &'static str,
        remote: SocketAddr,
        err_tx: mpsc::Sender<Error>,
    ) -> Result<(Session, mpsc::Receiver<Vec<u8>>)> {
        let endpoint = UdpEndpoint::connect(remote).await?;
        let local_sid = endpoint.local_session_id();
        debug!(session = name, sid = format_args!("{local_sid:08x}"), "connecting");

        let mut buf = [0u8; MAX_DATAGRAM];
        let deadline = Instant::now() + CONNECT_TIMEOUT;

        // Connect request, retransmitted until the accept arrives.
        let req = packet::connect_req(local_sid);
        let remote_sid = loop {
            endpoint.send(&req).await?;
            match endpoint.recv_deadline(&mut buf, CONNECT_RETRY_INTERVAL).await {
                Ok(n) => {
                    if let Some(sid) = packet::connect_ack_remote_sid(&buf[..n]) {
                        break sid;
                    }
                }
                Err(Error::Timeout) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                error!(session = name, "no answer to connect request");
                return Err(Error::Timeout);
            }
        };
        debug!(
            session = name,
            sid = format_args!("{remote_sid:08x}"),
            "got remote session id"
        );

        // Ready confirm.
        let rdy = packet::ready(local_sid, remote_sid);
        loop {
            endpoint.send(&rdy).await?;
            match endpoint.recv_deadline(&mut buf, CONNECT_RETRY_INTERVAL).await {
                Ok(n) if packet::is_ready_ack(&buf[..n]) => break,
                Ok(_) | Err(Error::Timeout) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                error!(session = name, "no answer to ready confirm");
                return Err(Error::Timeout);
            }
        }

        let inner = Arc::new(SessionInner {
            name,
            endpoint,
            local_sid,
            remote_sid,
            seq: AtomicU16::new(0),
            send_lock: Mutex::new(()),
            ping: Mutex::new(PingState {
                send_seq: 1,
                last_peer_seq: None,
                outstanding: None,
                latency: Duration::ZERO,
            }),
            err_tx,
            cancel: CancellationToken::new(),
        });

        let (read_tx, read_rx) = mpsc::channel(READ_CHANNEL_CAPACITY);
        let tasks = vec![
            tokio::spawn(reader_loop(Arc::clone(&inner), read_tx)),
            tokio::spawn(idle_loop(Arc::clone(&inner))),
            tokio::spawn(ping_loop(Arc::clone(&inner))),
        ];

        debug!(session = name, "session established");
        Ok((
            Session {
                inner,
                tasks: StdMutex::new(tasks),
            },
            read_rx,
        ))
    }

    /// Our session identifier.
    pub fn local_sid(&self) -> u32 {
        self.inner.local_sid
    }

    /// The radio's session identifier.
    pub fn remote_sid(&self) -> u32 {
        self.inner.remote_sid
    }

    /// Next outgoing sequence number.
    pub fn next_seq(&self) -> u16 {
        self.inner.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Send one packet.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        self.inner.send(data).await
    }

    /// Send one control-class packet twice back-to-back. The radio
    /// treats the duplicate as a no-op, and the redundancy covers single
    /// datagram loss during the handshakes.
    pub async fn send_twice(&self, data: &[u8]) -> Result<()> {
        self.inner.send(data).await?;
        self.inner.send(data).await
    }

    /// Last measured ping round-trip time.
    pub async fn latency(&self) -> Duration {
        self.inner.ping.lock().await.latency
    }

    /// Stop the session machinery. Idempotent; safe to call from any
    /// task.
    pub fn close(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        debug!(session = self.inner.name, "closing session");
        self.inner.cancel.cancel();
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Drains the endpoint: answers keepalives and pings, counts timeouts,
/// and hands everything else to the stream.
async fn reader_loop(inner: Arc<SessionInner>, read_tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    let mut consecutive_timeouts = 0u32;

    loop {
        let received = tokio::select! {
            _ = inner.cancel.cancelled() => break,
            r = inner.endpoint.recv(&mut buf) => r,
        };
        match received {
            Ok(n) => {
                consecutive_timeouts = 0;
                route(&inner, &buf[..n], &read_tx).await;
            }
            Err(Error::Timeout) => {
                consecutive_timeouts += 1;
                if consecutive_timeouts >= MAX_CONSECUTIVE_TIMEOUTS {
                    error!(session = inner.name, "radio stopped answering");
                    let _ = inner.err_tx.send(Error::ConnectionLost).await;
                    break;
                }
                warn!(session = inner.name, "stream break detected");
            }
            Err(e) => {
                let _ = inner.err_tx.send(e).await;
                break;
            }
        }
    }
}

async fn route(inner: &Arc<SessionInner>, data: &[u8], read_tx: &mpsc::Sender<Vec<u8>>) {
    if let Some(ping) = packet::parse_ping(data) {
        let mut ps = inner.ping.lock().await;
        if ping.reply {
            if let Some((seq, sent_at)) = ps.outstanding {
                if seq == ping.seq {
                    ps.latency = sent_at.elapsed();
                    ps.outstanding = None;
                }
            }
        } else {
            if let Some(last) = ps.last_peer_seq {
                if ping.seq != last.wrapping_add(1) {
                    warn!(
                        session = inner.name,
                        expected = last.wrapping_add(1),
                        got = ping.seq,
                        "packet loss detected"
                    );
                }
            }
            ps.last_peer_seq = Some(ping.seq);
            drop(ps);
            let reply = packet::ping_reply(&ping, inner.local_sid, inner.remote_sid);
            if let Err(e) = inner.send(&reply).await {
                trace!(session = inner.name, error = %e, "ping reply failed");
            }
        }
        return;
    }

    if let Some(reply) = packet::idle_reply(data, inner.local_sid, inner.remote_sid) {
        if let Err(e) = inner.send(&reply).await {
            trace!(session = inner.name, error = %e, "idle reply failed");
        }
        return;
    }

    if read_tx.send(data.to_vec()).await.is_err() {
        trace!(session = inner.name, "stream dropped its read channel");
    }
}

/// 100 ms idle keepalive.
async fn idle_loop(inner: Arc<SessionInner>) {
    let mut tick = tokio::time::interval(IDLE_INTERVAL);
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = tick.tick() => {
                let seq = inner.seq.fetch_add(1, Ordering::SeqCst);
                let p = packet::idle(seq, inner.local_sid, inner.remote_sid);
                // Keepalives go out twice back-to-back like the other
                // control-class packets.
                if inner.send(&p).await.is_err() || inner.send(&p).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// 100 ms sequenced ping with a random echo ID per request.
async fn ping_loop(inner: Arc<SessionInner>) {
    let mut tick = tokio::time::interval(PING_INTERVAL);
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = tick.tick() => {
                let mut echo = [0u8; 4];
                rand::thread_rng().fill(&mut echo);
                let p = {
                    let mut ps = inner.ping.lock().await;
                    let seq = ps.send_seq;
                    ps.send_seq = ps.send_seq.wrapping_add(1);
                    ps.outstanding = Some((seq, Instant::now()));
                    packet::ping_req(seq, inner.local_sid, inner.remote_sid, echo)
                };
                if inner.send(&p).await.is_err() {
                    break;
                }
            }
        }
    }
}
