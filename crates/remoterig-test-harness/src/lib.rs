//! remoterig-test-harness: test utilities for remoterig.
//!
//! This crate provides [`MockLink`] for deterministic unit testing of the
//! CI-V engine without a radio or a network.

pub mod mock_link;

pub use mock_link::MockLink;
