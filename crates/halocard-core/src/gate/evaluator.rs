//! ============================================================================
//! Token Gate - Balance check and tier derivation
//! ============================================================================
//! Queries the gating token balance once per evaluation and turns it into a
//! GateStatus. Oracle failures fail soft to "not admitted".
//! ============================================================================

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::oracle::{BalanceOracle, RpcBalanceOracle};
use super::types::{GatePolicy, GateStatus, TokenBalance};
use crate::config::GateConfig;
use crate::types::{HaloError, WalletIdentity};

/// Evaluates wallets against the gating token
pub struct TokenGate {
    oracle: Arc<dyn BalanceOracle>,
    policy: GatePolicy,
}

impl TokenGate {
    pub fn new(oracle: Arc<dyn BalanceOracle>, policy: GatePolicy) -> Self {
        Self { oracle, policy }
    }

    /// Build a gate talking to the configured RPC endpoint
    pub fn from_config(config: &GateConfig) -> Result<Self, HaloError> {
        let oracle = RpcBalanceOracle::new(
            &config.rpc_url,
            Duration::from_secs(config.rpc_timeout_secs),
        )
        .map_err(|e| HaloError::OracleUnavailable(e.to_string()))?;

        Ok(Self::new(Arc::new(oracle), config.policy()))
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Evaluate a wallet, surfacing oracle failures instead of failing soft
    pub async fn try_evaluate(&self, wallet: &WalletIdentity) -> Result<GateStatus, HaloError> {
        if !wallet.is_connected() {
            debug!("No wallet connected, skipping balance check");
            return Ok(self.policy.not_admitted());
        }

        let balance = self
            .oracle
            .token_balance(wallet, &self.policy.mint_address)
            .await
            .map_err(|e| HaloError::OracleUnavailable(e.to_string()))?
            .unwrap_or_else(|| {
                debug!("Wallet {} holds no token account for the mint", wallet.short());
                TokenBalance::zero(&self.policy.mint_address, self.policy.decimals)
            });

        if balance.decimals != self.policy.decimals {
            return Err(HaloError::OracleUnavailable(format!(
                "mint reports {} decimals, configured {}",
                balance.decimals, self.policy.decimals
            )));
        }

        let status = self.policy.status_for(balance);
        info!(
            "Gate for {}: admitted={} tier={} ({} tokens)",
            wallet.short(),
            status.admitted,
            status.tier,
            status.balance_formatted()
        );
        Ok(status)
    }

    /// Evaluate a wallet. Never fails: oracle errors are logged and resolve
    /// to the not-admitted Angel status.
    pub async fn evaluate(&self, wallet: &WalletIdentity) -> GateStatus {
        match self.try_evaluate(wallet).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    "Token gate check failed for {}: {} - treating as not admitted",
                    wallet.short(),
                    e
                );
                self.policy.not_admitted()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::testing::{test_policy, StaticOracle, TEST_WALLET};
    use crate::gate::{OracleError, Tier};

    fn wallet() -> WalletIdentity {
        WalletIdentity::parse(TEST_WALLET).unwrap()
    }

    #[tokio::test]
    async fn test_disconnected_wallet_skips_oracle() {
        let oracle = Arc::new(StaticOracle::holding(12_000_000_000_000));
        let gate = TokenGate::new(oracle.clone(), test_policy());

        let status = gate.evaluate(&WalletIdentity::disconnected()).await;
        assert!(!status.admitted);
        assert!(!status.loading);
        assert_eq!(status.tier, Tier::Angel);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_balance() {
        let oracle = Arc::new(StaticOracle::holding(0));
        let gate = TokenGate::new(oracle.clone(), test_policy());

        let status = gate.evaluate(&wallet()).await;
        assert!(!status.admitted);
        assert_eq!(status.tier, Tier::Angel);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_token_account_is_zero() {
        let gate = TokenGate::new(Arc::new(StaticOracle::no_account()), test_policy());
        let status = gate.try_evaluate(&wallet()).await.unwrap();
        assert!(!status.admitted);
        assert_eq!(status.balance.raw_amount, 0);
        assert_eq!(status.tier, Tier::Angel);
    }

    #[tokio::test]
    async fn test_cherubim_holder_admitted() {
        let oracle = Arc::new(StaticOracle::holding(12_000_000_000_000));
        let gate = TokenGate::new(oracle.clone(), test_policy());

        let status = gate.evaluate(&wallet()).await;
        assert!(status.admitted);
        assert_eq!(status.tier, Tier::Cherubim);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_fails_soft() {
        let oracle = Arc::new(StaticOracle::failing(OracleError::Transport(
            "connection refused".into(),
        )));
        let gate = TokenGate::new(oracle.clone(), test_policy());

        let status = gate.evaluate(&wallet()).await;
        assert!(!status.admitted);
        assert!(!status.loading);
        assert_eq!(status.tier, Tier::Angel);
        // one call, no retry
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_try_evaluate_surfaces_oracle_error() {
        let oracle = Arc::new(StaticOracle::failing(OracleError::Malformed("bad".into())));
        let gate = TokenGate::new(oracle, test_policy());

        let err = gate.try_evaluate(&wallet()).await.unwrap_err();
        assert!(matches!(err, HaloError::OracleUnavailable(_)));
    }

    /// Answers with a fixed balance reported in a different precision
    struct SixDecimalOracle;

    #[async_trait::async_trait]
    impl crate::gate::BalanceOracle for SixDecimalOracle {
        async fn token_balance(
            &self,
            _owner: &WalletIdentity,
            mint: &str,
        ) -> Result<Option<TokenBalance>, OracleError> {
            Ok(Some(TokenBalance {
                raw_amount: 12_000_000_000_000,
                ui_amount: 12_000_000.0,
                decimals: 6,
                mint_address: mint.to_string(),
            }))
        }
    }

    #[tokio::test]
    async fn test_decimals_mismatch_is_not_trusted() {
        let gate = TokenGate::new(Arc::new(SixDecimalOracle), test_policy());

        let err = gate.try_evaluate(&wallet()).await.unwrap_err();
        assert!(matches!(err, HaloError::OracleUnavailable(ref m) if m.contains("6 decimals")));

        let status = gate.evaluate(&wallet()).await;
        assert!(!status.admitted);
        assert_eq!(status.tier, Tier::Angel);
    }

    #[test]
    fn test_gate_from_config() {
        let gate = TokenGate::from_config(&GateConfig::default());
        assert!(gate.is_ok());
    }
}
