//! remoterig-core: Core traits, types, and error definitions for remoterig.
//!
//! This crate defines the abstractions shared by the session layer and the
//! CI-V command engine. Applications depend on these types without pulling
//! in the network machinery.
//!
//! # Key types
//!
//! - [`ReportEvent`] -- decoded radio state change notifications
//! - [`FrameSink`] -- outbound byte seam between the engine and its stream
//! - [`Band`] -- the fixed band table with last-tuned-frequency memory
//! - [`Error`] / [`Result`] -- error handling

pub mod band;
pub mod error;
pub mod events;
pub mod link;
pub mod meter;
pub mod types;

// Re-export key types at crate root for ergonomic `use remoterig_core::*`.
pub use band::{BandTable, GENE_BAND_IDX};
pub use error::{Error, Result};
pub use events::ReportEvent;
pub use link::FrameSink;
pub use types::{AgcMode, Filter, OperatingMode, SplitMode, TuningStep};
