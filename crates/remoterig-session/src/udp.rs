//! The datagram endpoint: one connected UDP socket per session.
//!
//! Each logical stream (control, serial, audio) owns its own endpoint
//! bound to an OS-assigned local port. Reads carry a one-second internal
//! deadline; a timeout is returned as [`Error::Timeout`] so the session
//! layer can count it, while any other socket error is fatal for the
//! session.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;

use remoterig_core::error::{Error, Result};

/// Internal read deadline for [`UdpEndpoint::recv`].
pub const READ_DEADLINE: Duration = Duration::from_secs(1);

/// Largest datagram the radio sends (well under one Ethernet MTU).
pub const MAX_DATAGRAM: usize = 1500;

/// A UDP socket connected to one remote address.
#[derive(Debug)]
pub struct UdpEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpEndpoint {
    /// Bind an OS-assigned local port and connect to the radio.
    pub async fn connect(remote: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await.map_err(|e| {
            tracing::error!(error = %e, "failed to bind UDP socket");
            Error::Io(e)
        })?;
        socket.connect(remote).await.map_err(|e| {
            tracing::error!(remote = %remote, error = %e, "failed to connect UDP socket");
            Error::Io(e)
        })?;
        let local_addr = socket.local_addr().map_err(Error::Io)?;
        tracing::debug!(local = %local_addr, remote = %remote, "endpoint connected");
        Ok(UdpEndpoint { socket, local_addr })
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The session identifier derived from the local address: the low
    /// 16 bits of the IP in the high half, the UDP port in the low half.
    ///
    /// The radio treats the value as opaque; any uniqueness-preserving
    /// construction would do.
    pub fn local_session_id(&self) -> u32 {
        let ip_low = match self.local_addr.ip() {
            IpAddr::V4(ip) => {
                let o = ip.octets();
                u16::from_be_bytes([o[2], o[3]])
            }
            IpAddr::V6(ip) => ip.segments()[7],
        };
        (u32::from(ip_low) << 16) | u32::from(self.local_addr.port())
    }

    /// Send one datagram, fire-and-forget.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        tracing::trace!(local = %self.local_addr, bytes = data.len(), "sending datagram");
        self.socket.send(data).await.map_err(|e| {
            tracing::error!(local = %self.local_addr, error = %e, "failed to send datagram");
            Error::Io(e)
        })?;
        Ok(())
    }

    /// Receive one datagram with the standard one-second deadline.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.recv_deadline(buf, READ_DEADLINE).await
    }

    /// Receive one datagram, waiting at most `timeout`.
    ///
    /// Returns [`Error::Timeout`] when nothing arrives in time; the caller
    /// decides whether that is fatal.
    pub async fn recv_deadline(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match tokio::time::timeout(timeout, self.socket.recv(buf)).await {
            Ok(Ok(n)) => {
                tracing::trace!(local = %self.local_addr, bytes = n, "received datagram");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(local = %self.local_addr, error = %e, "failed to receive datagram");
                Err(Error::Io(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }
}
