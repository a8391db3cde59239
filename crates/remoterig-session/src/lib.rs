//! remoterig-session: the UDP session layer for remoterig.
//!
//! The radio speaks a connection-oriented pseudo-reliable protocol over
//! UDP. Three logical streams (control, serial, audio) share one body of
//! session machinery:
//!
//! - **Datagram endpoint** ([`udp`]) -- one connected socket per stream,
//!   timed receive with a distinguishable timeout.
//! - **Packet layouts** ([`packet`]) -- builders and parsers for the
//!   session protocol's wire formats.
//! - **Session** ([`session`]) -- connect exchange, idle keepalive,
//!   sequenced ping with loss detection, timeout accounting, teardown.
//! - **Control stream** ([`control`]) -- login, two-step auth, periodic
//!   reauth, and the serial/audio stream request.
//! - **Serial stream** ([`serial`]) -- CI-V payload wrap/unwrap and the
//!   [`FrameSink`](remoterig_core::FrameSink) seam the engine uses.
//! - **Audio stream** ([`audio`]) -- opaque PCM carry.
//!
//! Credentials are obfuscated with the XOR table in [`auth`]; the wire
//! protocol offers no confidentiality beyond that.

pub mod audio;
pub mod auth;
pub mod control;
pub mod packet;
pub mod serial;
pub mod session;
pub mod udp;

pub use audio::{AudioStream, AUDIO_PORT};
pub use control::{ControlConfig, ControlStream, CONTROL_PORT};
pub use serial::{SerialStream, SERIAL_PORT};
pub use session::Session;
pub use udp::UdpEndpoint;
