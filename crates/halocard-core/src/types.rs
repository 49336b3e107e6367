//! ============================================================================
//! Core Types for HaloCard
//! ============================================================================
//! Wallet identity and the error taxonomy shared by the gate, the registry
//! and the mint flow. Transport errors never cross these boundaries raw.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length in bytes of a decoded Solana public key
pub const PUBKEY_LEN: usize = 32;

/// Base-58 public key of the connected wallet.
///
/// The empty identity stands for "no wallet connected" and is a valid value,
/// not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletIdentity(String);

impl WalletIdentity {
    /// Identity used while no wallet is connected
    pub fn disconnected() -> Self {
        Self(String::new())
    }

    /// Parse and validate a base-58 public key. Empty input yields the
    /// disconnected identity.
    pub fn parse(s: &str) -> Result<Self, HaloError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::disconnected());
        }
        validate_pubkey(trimmed)
            .map_err(|e| HaloError::InvalidInput(format!("Invalid wallet address: {}", e)))?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn is_connected(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines and tables (`7xKX...gAsU`)
    pub fn short(&self) -> String {
        if self.0.len() <= 10 {
            return self.0.clone();
        }
        format!("{}...{}", &self.0[..4], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for WalletIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WalletIdentity {
    type Err = HaloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check that `s` is base-58 and decodes to a 32-byte key
pub fn validate_pubkey(s: &str) -> Result<(), String> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|e| format!("not base-58 ({})", e))?;
    if bytes.len() != PUBKEY_LEN {
        return Err(format!(
            "decodes to {} bytes, expected {}",
            bytes.len(),
            PUBKEY_LEN
        ));
    }
    Ok(())
}

/// Error kinds surfaced to callers of the gate, the registry and the mint flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum HaloError {
    #[error("Balance oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("A HaloCard already exists for wallet {wallet}")]
    CardExists { wallet: String },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Token gate not cleared: {shortfall:.2} more tokens required")]
    GateDenied { shortfall: f64 },
}

impl HaloError {
    /// Only store failures are worth a manual retry; conflicts redirect and
    /// input errors need different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HaloError::ServerError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    #[test]
    fn test_parse_valid_wallet() {
        let wallet = WalletIdentity::parse(WALLET).unwrap();
        assert!(wallet.is_connected());
        assert_eq!(wallet.as_str(), WALLET);
        assert_eq!(wallet.short(), "7xKX...gAsU");
    }

    #[test]
    fn test_parse_empty_is_disconnected() {
        let wallet = WalletIdentity::parse("   ").unwrap();
        assert!(!wallet.is_connected());
        assert_eq!(wallet, WalletIdentity::disconnected());
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        // '0' and 'l' are outside the base-58 alphabet
        assert!(matches!(
            WalletIdentity::parse("0OIl"),
            Err(HaloError::InvalidInput(_))
        ));
        // valid base-58, wrong length
        assert!(matches!(
            WalletIdentity::parse("abc"),
            Err(HaloError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(HaloError::ServerError("boom".into()).is_retryable());
        assert!(!HaloError::CardExists { wallet: WALLET.into() }.is_retryable());
        assert!(!HaloError::InvalidInput("x".into()).is_retryable());
        assert!(!HaloError::OracleUnavailable("x".into()).is_retryable());
    }
}
