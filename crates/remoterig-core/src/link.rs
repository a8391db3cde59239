//! Outbound byte seam between the CI-V engine and its carrying stream.
//!
//! The engine never touches a socket directly: it hands framed CI-V bytes
//! to a [`FrameSink`] and receives inbound bytes over a channel owned by
//! the stream. This seam enables deterministic engine tests with the mock
//! link from `remoterig-test-harness`.

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous outbound byte sink.
///
/// Implemented by the serial stream (which wraps the bytes in a sequenced
/// datagram) and by test mocks (which record them).
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Send one framed message to the radio.
    ///
    /// The bytes are transmitted as a unit; implementations must not split
    /// or coalesce messages.
    async fn send(&self, data: &[u8]) -> Result<()>;
}
