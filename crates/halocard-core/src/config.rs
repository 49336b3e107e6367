//! ============================================================================
//! Configuration - Gate and store settings
//! ============================================================================
//! Everything environment-specific (mint, thresholds, RPC endpoint, store
//! identifiers) comes from HALOCARD_* variables with mainnet defaults.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::gate::{GatePolicy, TierBreakpoints};
use crate::types::validate_pubkey;

/// Gating token mint
pub const DEFAULT_MINT: &str = "ArwBHrqR721SVSqnrk6MAwvwbFZ2cvadyGyHdKxobonk";

/// Decimals of the gating token
pub const DEFAULT_DECIMALS: u8 = 9;

/// Minimum raw holding to clear the gate (500 tokens at 9 decimals)
pub const DEFAULT_MIN_HOLDINGS_RAW: u128 = 500_000_000_000;

pub const DEFAULT_ARCHANGEL_THRESHOLD: f64 = 2_500.0;
pub const DEFAULT_CHERUBIM_THRESHOLD: f64 = 10_000.0;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 15;

pub const DEFAULT_ATLAS_BASE_URL: &str = "https://services.cloud.mongodb.com";
pub const DEFAULT_ATLAS_SERVICE: &str = "mongodb-atlas";
pub const DEFAULT_DATABASE: &str = "halocard";
pub const DEFAULT_COLLECTION: &str = "cards";
pub const DEFAULT_CREATE_FUNCTION: &str = "createCardIfNotExists";
pub const DEFAULT_CARD_SOURCE: &str = "webapp";
pub const DEFAULT_ATLAS_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HaloConfig {
    pub gate: GateConfig,
    pub store: StoreConfig,
}

/// Token gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    pub rpc_url: String,
    pub mint_address: String,
    pub token_decimals: u8,
    pub min_holdings_raw: u128,
    pub archangel_threshold: f64,
    pub cherubim_threshold: f64,
    pub rpc_timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            mint_address: DEFAULT_MINT.to_string(),
            token_decimals: DEFAULT_DECIMALS,
            min_holdings_raw: DEFAULT_MIN_HOLDINGS_RAW,
            archangel_threshold: DEFAULT_ARCHANGEL_THRESHOLD,
            cherubim_threshold: DEFAULT_CHERUBIM_THRESHOLD,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
        }
    }
}

impl GateConfig {
    /// Build the evaluation policy from these settings
    pub fn policy(&self) -> GatePolicy {
        GatePolicy {
            mint_address: self.mint_address.clone(),
            decimals: self.token_decimals,
            min_holdings_raw: self.min_holdings_raw,
            breakpoints: TierBreakpoints {
                archangel: self.archangel_threshold,
                cherubim: self.cherubim_threshold,
            },
        }
    }
}

/// Card store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// App Services application id; the remote store is disabled when unset
    pub atlas_app_id: Option<String>,
    pub atlas_base_url: String,
    pub atlas_service: String,
    pub database: String,
    pub collection: String,
    pub create_function: String,
    /// Per-request timeout for App Services calls
    pub atlas_timeout_secs: u64,
    /// Local redb file; None resolves to ~/.halocard/cards.redb
    pub db_path: Option<PathBuf>,
    /// Value recorded as `metadata.source` on minted cards
    pub card_source: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            atlas_app_id: None,
            atlas_base_url: DEFAULT_ATLAS_BASE_URL.to_string(),
            atlas_service: DEFAULT_ATLAS_SERVICE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            create_function: DEFAULT_CREATE_FUNCTION.to_string(),
            atlas_timeout_secs: DEFAULT_ATLAS_TIMEOUT_SECS,
            db_path: None,
            card_source: DEFAULT_CARD_SOURCE.to_string(),
        }
    }
}

impl HaloConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup. Unset or blank
    /// keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = HaloConfig::default();

        let gate = &mut config.gate;
        if let Some(v) = get("HALOCARD_RPC_URL") {
            gate.rpc_url = v;
        }
        if let Some(v) = get("HALOCARD_MINT") {
            gate.mint_address = v;
        }
        if let Some(v) = get("HALOCARD_TOKEN_DECIMALS") {
            gate.token_decimals = parse_value("HALOCARD_TOKEN_DECIMALS", &v)?;
        }
        if let Some(v) = get("HALOCARD_MIN_HOLDINGS_RAW") {
            gate.min_holdings_raw = parse_value("HALOCARD_MIN_HOLDINGS_RAW", &v)?;
        }
        if let Some(v) = get("HALOCARD_ARCHANGEL_THRESHOLD") {
            gate.archangel_threshold = parse_value("HALOCARD_ARCHANGEL_THRESHOLD", &v)?;
        }
        if let Some(v) = get("HALOCARD_CHERUBIM_THRESHOLD") {
            gate.cherubim_threshold = parse_value("HALOCARD_CHERUBIM_THRESHOLD", &v)?;
        }
        if let Some(v) = get("HALOCARD_RPC_TIMEOUT_SECS") {
            gate.rpc_timeout_secs = parse_value("HALOCARD_RPC_TIMEOUT_SECS", &v)?;
        }

        let store = &mut config.store;
        store.atlas_app_id = get("HALOCARD_ATLAS_APP_ID");
        if let Some(v) = get("HALOCARD_ATLAS_BASE_URL") {
            store.atlas_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("HALOCARD_ATLAS_SERVICE") {
            store.atlas_service = v;
        }
        if let Some(v) = get("HALOCARD_DATABASE") {
            store.database = v;
        }
        if let Some(v) = get("HALOCARD_COLLECTION") {
            store.collection = v;
        }
        if let Some(v) = get("HALOCARD_CREATE_FUNCTION") {
            store.create_function = v;
        }
        if let Some(v) = get("HALOCARD_ATLAS_TIMEOUT_SECS") {
            store.atlas_timeout_secs = parse_value("HALOCARD_ATLAS_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("HALOCARD_DB_PATH") {
            store.db_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("HALOCARD_CARD_SOURCE") {
            store.card_source = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the gate incoherent
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gate = &self.gate;

        validate_pubkey(&gate.mint_address).map_err(|reason| ConfigError::InvalidValue {
            key: "HALOCARD_MINT".to_string(),
            reason,
        })?;

        if gate.token_decimals > 18 {
            return Err(ConfigError::InvalidValue {
                key: "HALOCARD_TOKEN_DECIMALS".to_string(),
                reason: format!("{} exceeds 18", gate.token_decimals),
            });
        }

        if !(gate.archangel_threshold > 0.0 && gate.archangel_threshold < gate.cherubim_threshold) {
            return Err(ConfigError::Inconsistent(format!(
                "tier breakpoints must satisfy 0 < archangel ({}) < cherubim ({})",
                gate.archangel_threshold, gate.cherubim_threshold
            )));
        }

        // Every Archangel or Cherubim holder must also clear the gate
        let policy = gate.policy();
        let archangel_raw = policy.to_raw(gate.archangel_threshold);
        if gate.min_holdings_raw > archangel_raw {
            return Err(ConfigError::Inconsistent(format!(
                "min holdings {} raw exceeds the archangel breakpoint ({} raw)",
                gate.min_holdings_raw, archangel_raw
            )));
        }

        if gate.rpc_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HALOCARD_RPC_TIMEOUT_SECS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.store.atlas_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HALOCARD_ATLAS_TIMEOUT_SECS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Resolve the local database path (explicit, configured, or home default)
    pub fn local_db_path(&self, explicit: Option<&str>) -> anyhow::Result<PathBuf> {
        if let Some(p) = explicit {
            return Ok(PathBuf::from(p));
        }
        if let Some(p) = &self.store.db_path {
            return Ok(p.clone());
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
        let halo_dir = home.join(".halocard");
        std::fs::create_dir_all(&halo_dir)
            .map_err(|e| anyhow::anyhow!("Failed to create .halocard directory: {}", e))?;
        Ok(halo_dir.join("cards.redb"))
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{}': {}", raw, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = HaloConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.gate.mint_address, DEFAULT_MINT);
        assert_eq!(config.gate.min_holdings_raw, DEFAULT_MIN_HOLDINGS_RAW);
        assert_eq!(config.store.collection, "cards");
        assert!(config.store.atlas_app_id.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = HaloConfig::from_lookup(lookup(&[
            ("HALOCARD_RPC_URL", "http://localhost:8899"),
            ("HALOCARD_MIN_HOLDINGS_RAW", "1000"),
            ("HALOCARD_ATLAS_APP_ID", "halocard-abcde"),
            ("HALOCARD_ATLAS_BASE_URL", "https://example.test/"),
            ("HALOCARD_DB_PATH", "/tmp/cards.redb"),
            ("HALOCARD_CARD_SOURCE", "  "),
        ]))
        .unwrap();

        assert_eq!(config.gate.rpc_url, "http://localhost:8899");
        assert_eq!(config.gate.min_holdings_raw, 1000);
        assert_eq!(config.store.atlas_app_id.as_deref(), Some("halocard-abcde"));
        assert_eq!(config.store.atlas_base_url, "https://example.test");
        assert_eq!(config.store.db_path, Some(PathBuf::from("/tmp/cards.redb")));
        // blank values keep the default
        assert_eq!(config.store.card_source, DEFAULT_CARD_SOURCE);
    }

    #[test]
    fn test_unparseable_number() {
        let err =
            HaloConfig::from_lookup(lookup(&[("HALOCARD_TOKEN_DECIMALS", "nine")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "HALOCARD_TOKEN_DECIMALS"
        ));
    }

    #[test]
    fn test_atlas_timeout() {
        let config =
            HaloConfig::from_lookup(lookup(&[("HALOCARD_ATLAS_TIMEOUT_SECS", "5")])).unwrap();
        assert_eq!(config.store.atlas_timeout_secs, 5);
        assert_eq!(HaloConfig::default().store.atlas_timeout_secs, DEFAULT_ATLAS_TIMEOUT_SECS);

        let err =
            HaloConfig::from_lookup(lookup(&[("HALOCARD_ATLAS_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "HALOCARD_ATLAS_TIMEOUT_SECS"
        ));
    }

    #[test]
    fn test_bad_mint_rejected() {
        let err = HaloConfig::from_lookup(lookup(&[("HALOCARD_MINT", "not-a-mint")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_breakpoints_must_be_ordered() {
        let err = HaloConfig::from_lookup(lookup(&[
            ("HALOCARD_ARCHANGEL_THRESHOLD", "10000"),
            ("HALOCARD_CHERUBIM_THRESHOLD", "2500"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }

    #[test]
    fn test_threshold_above_archangel_rejected() {
        // 3000 tokens at 9 decimals is above the 2500 archangel breakpoint
        let err = HaloConfig::from_lookup(lookup(&[(
            "HALOCARD_MIN_HOLDINGS_RAW",
            "3000000000000",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }

    #[test]
    fn test_explicit_db_path_wins() {
        let config = HaloConfig::default();
        let path = config.local_db_path(Some("/tmp/explicit.redb")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/explicit.redb"));
    }
}
