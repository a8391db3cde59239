//! remoterig-civ: the CI-V command engine for remoterig.
//!
//! This crate speaks the radio's byte-framed CI-V control protocol over
//! the serial session. It provides:
//!
//! - **Frame codec** ([`frame`]) -- sentinel framing and the 5-byte BCD
//!   frequency codec.
//! - **Command builders** ([`command`]) -- pure functions producing the
//!   exact wire bytes for every supported get/set operation, plus the
//!   [`CommandId`](command::CommandId) identity the pending table is keyed
//!   by.
//! - **Device state** ([`state`]) -- the decoded state cache.
//! - **CivEngine** ([`engine`]) -- pending-command tracking with 500 ms
//!   retry, the one-second status poll, PTT/tune safety timers, and
//!   decode routing with pass-through of unsolicited traffic.
//!
//! # Example
//!
//! ```
//! use remoterig_civ::command;
//! use remoterig_civ::frame::DEFAULT_CIV_ADDR;
//!
//! // Tune the main VFO to 14.250 MHz.
//! let cmd = command::set_vfo_freq(DEFAULT_CIV_ADDR, 0, 14_250_000);
//! assert_eq!(
//!     cmd,
//!     vec![0xFE, 0xFE, 0xA4, 0xE0, 0x25, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]
//! );
//! ```

pub mod command;
pub mod engine;
pub mod frame;
pub mod state;

pub use command::CommandId;
pub use engine::{CivEngine, COMMAND_RETRY_TIMEOUT, PTT_TIMEOUT, STATUS_POLL_INTERVAL, TUNE_TIMEOUT};
pub use state::DeviceState;
