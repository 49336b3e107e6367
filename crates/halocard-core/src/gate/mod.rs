//! ============================================================================
//! Gate Module - Token-gated admission and tiers
//! ============================================================================
//! Checks the gating SPL token balance of a wallet and derives admission and
//! the HaloCard tier.
//!
//! ## Tiers
//! - **Angel**: below 2.5K tokens
//! - **Archangel**: 2.5K+ tokens
//! - **Cherubim**: 10K+ tokens
//!
//! Admission uses a separate raw minimum that is validated to sit at or
//! below the Archangel breakpoint.
//!
//! ## Usage
//! ```rust,ignore
//! use halocard_core::gate::TokenGate;
//!
//! let gate = TokenGate::from_config(&config.gate)?;
//! let status = gate.evaluate(&wallet).await;
//! if status.admitted { /* mint */ }
//! ```
//! ============================================================================

mod evaluator;
mod oracle;
mod types;
mod watcher;

pub use evaluator::TokenGate;
pub use oracle::{BalanceOracle, OracleError, RpcBalanceOracle};
pub use types::{format_balance, GatePolicy, GateStatus, Tier, TierBreakpoints, TokenBalance};
pub use watcher::{GateWatcher, WatchedGate};

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::types::WalletIdentity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub const TEST_MINT: &str = "ArwBHrqR721SVSqnrk6MAwvwbFZ2cvadyGyHdKxobonk";
    pub const TEST_WALLET: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
    pub const OTHER_WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    pub fn test_policy() -> GatePolicy {
        GatePolicy {
            mint_address: TEST_MINT.to_string(),
            decimals: 9,
            min_holdings_raw: 500_000_000_000,
            breakpoints: TierBreakpoints {
                archangel: 2_500.0,
                cherubim: 10_000.0,
            },
        }
    }

    /// Gate status for a wallet holding `ui` tokens under [`test_policy`]
    pub fn status_holding(ui: f64) -> GateStatus {
        let policy = test_policy();
        let raw = policy.to_raw(ui);
        policy.status_for(TokenBalance {
            raw_amount: raw,
            ui_amount: ui,
            decimals: policy.decimals,
            mint_address: policy.mint_address.clone(),
        })
    }

    /// Oracle with a fixed answer that counts its calls
    pub struct StaticOracle {
        answer: Result<Option<u128>, OracleError>,
        calls: AtomicUsize,
    }

    impl StaticOracle {
        pub fn holding(raw: u128) -> Self {
            Self {
                answer: Ok(Some(raw)),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn no_account() -> Self {
            Self {
                answer: Ok(None),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(err: OracleError) -> Self {
            Self {
                answer: Err(err),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BalanceOracle for StaticOracle {
        async fn token_balance(
            &self,
            _owner: &WalletIdentity,
            mint: &str,
        ) -> Result<Option<TokenBalance>, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let raw = self.answer.clone()?;
            Ok(raw.map(|raw| TokenBalance {
                raw_amount: raw,
                ui_amount: raw as f64 / 1e9,
                decimals: 9,
                mint_address: mint.to_string(),
            }))
        }
    }
}
