//! Single-flight guard for the analysis job

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Allows at most one holder at a time
///
/// A firing that finds the guard held is dropped, not queued. Clones share
/// the same flag.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    running: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard if it is free
    ///
    /// The returned permit releases the guard when dropped, including while
    /// unwinding from a panic.
    pub fn try_acquire(&self) -> Option<FlightPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit {
                running: Arc::clone(&self.running),
            })
    }

    /// Whether a permit is currently held
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof of holding a [`SingleFlight`]
#[derive(Debug)]
#[must_use = "the guard is released as soon as the permit is dropped"]
pub struct FlightPermit {
    running: Arc<AtomicBool>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
