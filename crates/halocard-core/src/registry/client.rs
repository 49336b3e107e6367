//! ============================================================================
//! Card Registry - One card per wallet
//! ============================================================================
//! Validates input, delegates to the store's atomic insert-if-absent, and
//! normalizes store errors into HaloError. Never caches; every read goes to
//! the store.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::store::{CardStore, StoreError};
use super::types::{Card, CardLookup, CardMetadata, NewCard};
use crate::gate::Tier;
use crate::types::{HaloError, WalletIdentity};

/// Client over a [`CardStore`]
#[derive(Clone)]
pub struct CardRegistry {
    store: Arc<dyn CardStore>,
}

impl CardRegistry {
    pub fn new(store: Arc<dyn CardStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Does `wallet` own a card? A disconnected wallet never does.
    pub async fn exists(&self, wallet: &WalletIdentity) -> Result<CardLookup, HaloError> {
        if !wallet.is_connected() {
            return Ok(CardLookup::from(None));
        }

        let card = self
            .store
            .find_one(wallet)
            .await
            .map_err(|e| normalize(e, wallet))?;

        debug!("Card lookup for {}: exists={}", wallet.short(), card.is_some());
        Ok(CardLookup::from(card))
    }

    /// Create the wallet's card unless one exists.
    pub async fn create(
        &self,
        wallet: &WalletIdentity,
        display_name: Option<&str>,
        tier: Tier,
        metadata: Option<CardMetadata>,
    ) -> Result<Card, HaloError> {
        let new_card = NewCard::new(wallet, display_name, tier, metadata)?;

        match self.store.insert_if_absent(new_card).await {
            Ok(card) => {
                info!(
                    "Minted {} card for {} ({})",
                    card.tier,
                    wallet.short(),
                    self.store.backend_name()
                );
                Ok(card)
            }
            Err(e) => {
                if e != StoreError::Duplicate {
                    warn!("Card creation failed for {}: {}", wallet.short(), e);
                }
                Err(normalize(e, wallet))
            }
        }
    }

    /// Newest cards first, at most `limit`
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Card>, HaloError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut cards = self
            .store
            .find_recent(limit)
            .await
            .map_err(|e| HaloError::ServerError(e.to_string()))?;

        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        cards.truncate(limit);
        Ok(cards)
    }
}

fn normalize(error: StoreError, wallet: &WalletIdentity) -> HaloError {
    match error {
        StoreError::Duplicate => HaloError::CardExists {
            wallet: wallet.to_string(),
        },
        StoreError::Backend(message) => HaloError::ServerError(message),
    }
}
