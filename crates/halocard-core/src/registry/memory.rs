//! In-process card store. Same contract as the persistent backends; the
//! map lock makes insert-if-absent atomic.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::store::{CardStore, StoreError};
use super::types::{Card, NewCard};
use crate::types::WalletIdentity;

#[derive(Default)]
pub struct MemoryCardStore {
    cards: Mutex<HashMap<WalletIdentity, Card>>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing cards (later duplicates are ignored)
    pub fn with_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut map = HashMap::new();
        for card in cards {
            map.entry(card.wallet_address.clone()).or_insert(card);
        }
        Self {
            cards: Mutex::new(map),
        }
    }

    pub async fn len(&self) -> usize {
        self.cards.lock().await.len()
    }
}

#[async_trait]
impl CardStore for MemoryCardStore {
    async fn find_one(&self, wallet: &WalletIdentity) -> Result<Option<Card>, StoreError> {
        Ok(self.cards.lock().await.get(wallet).cloned())
    }

    async fn insert_if_absent(&self, card: NewCard) -> Result<Card, StoreError> {
        let mut cards = self.cards.lock().await;
        if cards.contains_key(&card.wallet_address) {
            return Err(StoreError::Duplicate);
        }

        let card = card.into_card(Utc::now());
        cards.insert(card.wallet_address.clone(), card.clone());
        debug!("Inserted card for {} (memory)", card.wallet_address.short());
        Ok(card)
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Card>, StoreError> {
        let cards = self.cards.lock().await;
        let mut recent: Vec<Card> = cards.values().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
