//! Mock frame sink for deterministic engine tests.
//!
//! [`MockLink`] implements [`FrameSink`] by recording every frame the
//! engine transmits. Tests inspect the log, and inject radio replies
//! through the inbound channel they hand to the engine at startup.
//!
//! # Example
//!
//! ```
//! use remoterig_test_harness::MockLink;
//!
//! let link = MockLink::new();
//! // ... hand Arc::clone(&link) to the engine, exercise it ...
//! assert!(link.sent().is_empty());
//! ```

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use remoterig_core::error::{Error, Result};
use remoterig_core::link::FrameSink;

/// A [`FrameSink`] that records every transmitted frame.
///
/// The sink can be switched into a failing state to exercise transport
/// error paths.
#[derive(Debug, Default)]
pub struct MockLink {
    sent: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
}

impl MockLink {
    /// Create a new mock link in the working state.
    pub fn new() -> Arc<Self> {
        Arc::new(MockLink::default())
    }

    /// All frames sent so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().expect("mock link lock poisoned").clone()
    }

    /// Number of frames sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("mock link lock poisoned").len()
    }

    /// Number of times the exact frame was sent.
    pub fn count_of(&self, frame: &[u8]) -> usize {
        self.sent
            .lock()
            .expect("mock link lock poisoned")
            .iter()
            .filter(|f| f.as_slice() == frame)
            .count()
    }

    /// Whether the exact frame has been sent at least once.
    pub fn was_sent(&self, frame: &[u8]) -> bool {
        self.count_of(frame) > 0
    }

    /// Forget the frames recorded so far.
    pub fn clear(&self) {
        self.sent.lock().expect("mock link lock poisoned").clear();
    }

    /// Make subsequent sends fail with [`Error::NotConnected`].
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl FrameSink for MockLink {
    async fn send(&self, data: &[u8]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        self.sent
            .lock()
            .expect("mock link lock poisoned")
            .push(data.to_vec());
        Ok(())
    }
}
