//! ============================================================================
//! Gate Watcher - Gate status for the currently connected wallet
//! ============================================================================
//! Re-evaluates on every wallet change. Evaluations that resolve after the
//! wallet moved on are dropped instead of overwriting the newer status.
//! ============================================================================

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::evaluator::TokenGate;
use super::types::GateStatus;
use crate::liveness::Liveness;
use crate::types::WalletIdentity;

/// Wallet and the status computed for it
#[derive(Debug, Clone)]
pub struct WatchedGate {
    pub wallet: WalletIdentity,
    pub status: GateStatus,
}

/// Holds the gate status for the connected wallet
pub struct GateWatcher {
    gate: Arc<TokenGate>,
    liveness: Liveness,
    state: Arc<RwLock<WatchedGate>>,
}

impl GateWatcher {
    pub fn new(gate: Arc<TokenGate>) -> Self {
        let status = GateStatus::pending(gate.policy());
        Self {
            gate,
            liveness: Liveness::new(),
            state: Arc::new(RwLock::new(WatchedGate {
                wallet: WalletIdentity::disconnected(),
                status,
            })),
        }
    }

    /// React to a wallet connect/disconnect/switch. Returns whether the
    /// evaluation result was applied (false when a newer change superseded it).
    pub async fn wallet_changed(&self, wallet: WalletIdentity) -> bool {
        let ticket = self.liveness.advance();

        {
            let mut state = self.state.write().await;
            if !ticket.is_live() {
                debug!("Wallet change to {} superseded before it applied", wallet.short());
                return false;
            }
            state.wallet = wallet.clone();
            state.status = if wallet.is_connected() {
                GateStatus::pending(self.gate.policy())
            } else {
                self.gate.policy().not_admitted()
            };
        }

        if !wallet.is_connected() {
            return true;
        }

        let status = self.gate.evaluate(&wallet).await;

        let mut state = self.state.write().await;
        if !ticket.is_live() {
            warn!(
                "Discarding stale gate result for {} (epoch {} superseded)",
                wallet.short(),
                ticket.epoch()
            );
            return false;
        }

        debug!("Applying gate status for {}: {:?}", wallet.short(), status.tier);
        state.status = status;
        true
    }

    pub async fn current(&self) -> WatchedGate {
        self.state.read().await.clone()
    }

    pub async fn status(&self) -> GateStatus {
        self.state.read().await.status.clone()
    }
}
