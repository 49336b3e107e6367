//! ============================================================================
//! HaloService - Entry points for the presentation layer
//! ============================================================================
//! Bundles the token gate and the card registry built from one HaloConfig.
//! The gate never calls the registry; the mint flow joins them.
//! ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::config::HaloConfig;
use crate::gate::{GateStatus, Tier, TokenGate};
use crate::mint::MintFlow;
use crate::registry::{
    AtlasCardStore, Card, CardLookup, CardMetadata, CardRegistry, CardStore, LocalCardStore,
};
use crate::types::{HaloError, WalletIdentity};

/// Which card store backend to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreChoice {
    /// Atlas when an app id is configured, local otherwise
    #[default]
    Auto,
    Atlas,
    Local,
}

impl FromStr for StoreChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(StoreChoice::Auto),
            "atlas" => Ok(StoreChoice::Atlas),
            "local" => Ok(StoreChoice::Local),
            other => Err(format!("Unknown store '{}' (expected auto, atlas or local)", other)),
        }
    }
}

impl fmt::Display for StoreChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreChoice::Auto => "auto",
            StoreChoice::Atlas => "atlas",
            StoreChoice::Local => "local",
        };
        f.write_str(name)
    }
}

/// Open the card store selected by `choice`
pub fn open_store(
    config: &HaloConfig,
    choice: StoreChoice,
    db_path: Option<&str>,
) -> anyhow::Result<Arc<dyn CardStore>> {
    let use_atlas = match choice {
        StoreChoice::Atlas => true,
        StoreChoice::Local => false,
        StoreChoice::Auto => config.store.atlas_app_id.is_some(),
    };

    if use_atlas {
        let store = AtlasCardStore::new(&config.store)?;
        info!("Using remote card store ({})", config.store.atlas_base_url);
        Ok(Arc::new(store))
    } else {
        let path = config.local_db_path(db_path)?;
        Ok(Arc::new(LocalCardStore::open(&path)?))
    }
}

#[derive(Clone)]
pub struct HaloService {
    gate: Arc<TokenGate>,
    registry: CardRegistry,
    card_source: String,
}

impl HaloService {
    pub fn new(
        gate: Arc<TokenGate>,
        registry: CardRegistry,
        card_source: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            registry,
            card_source: card_source.into(),
        }
    }

    /// Build the gate from config and put the registry on `store`
    pub fn from_config(config: &HaloConfig, store: Arc<dyn CardStore>) -> Result<Self, HaloError> {
        let gate = TokenGate::from_config(&config.gate)?;
        Ok(Self::new(
            Arc::new(gate),
            CardRegistry::new(store),
            config.store.card_source.clone(),
        ))
    }

    pub fn gate(&self) -> &Arc<TokenGate> {
        &self.gate
    }

    pub fn registry(&self) -> &CardRegistry {
        &self.registry
    }

    pub async fn evaluate(&self, wallet: &WalletIdentity) -> GateStatus {
        self.gate.evaluate(wallet).await
    }

    pub async fn exists(&self, wallet: &WalletIdentity) -> Result<CardLookup, HaloError> {
        self.registry.exists(wallet).await
    }

    pub async fn create(
        &self,
        wallet: &WalletIdentity,
        display_name: Option<&str>,
        tier: Tier,
        metadata: Option<CardMetadata>,
    ) -> Result<Card, HaloError> {
        self.registry.create(wallet, display_name, tier, metadata).await
    }

    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Card>, HaloError> {
        self.registry.list_recent(limit).await
    }

    /// Fresh mint flow over this service's registry
    pub fn mint_flow(&self) -> MintFlow {
        MintFlow::new(self.registry.clone(), self.card_source.clone())
    }
}
