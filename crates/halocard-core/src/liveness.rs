//! ============================================================================
//! Liveness - Stale-result guard for async view updates
//! ============================================================================
//! Every trigger (wallet change, new check) advances an epoch. An async
//! effect holds the ticket of the epoch that started it and may only write
//! shared state while that ticket is still current.
//! ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Epoch counter shared by one piece of view state
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    epoch: Arc<AtomicU64>,
}

/// Proof that a result belongs to a given epoch
#[derive(Debug, Clone)]
pub struct LivenessTicket {
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch, invalidating every outstanding ticket
    pub fn advance(&self) -> LivenessTicket {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        LivenessTicket {
            epoch,
            current: Arc::clone(&self.epoch),
        }
    }

    /// Ticket for the current epoch without invalidating anything. For
    /// effects that follow a trigger instead of being one.
    pub fn observe(&self) -> LivenessTicket {
        LivenessTicket {
            epoch: self.epoch.load(Ordering::SeqCst),
            current: Arc::clone(&self.epoch),
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

impl LivenessTicket {
    pub fn is_live(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
