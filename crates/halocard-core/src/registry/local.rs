// ============================================================================
// LocalCardStore - Embedded Card Database (redb)
// ============================================================================
// Persistent local card collection keyed by wallet address.
// Default path: ~/.halocard/cards.redb (override via HALOCARD_DB_PATH env var)
// ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::store::{CardStore, StoreError};
use super::types::{Card, NewCard};
use crate::types::WalletIdentity;

// Table definitions
const CARDS: TableDefinition<&str, &[u8]> = TableDefinition::new("cards");

/// Result of a local insert-if-absent
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Card),
    /// A card for the wallet was already present; nothing was written
    Exists(Card),
}

/// redb-backed card store. Clones share the same database handle.
#[derive(Clone)]
pub struct LocalCardStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl LocalCardStore {
    /// Open (or create) the card database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening card database at: {}", path.display());

        let db = Database::create(path).map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure the table exists by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(CARDS)
                .map_err(|e| anyhow!("Failed to create cards table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_card(&self, wallet: &str) -> Result<Option<Card>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(CARDS)
            .map_err(|e| anyhow!("Failed to open cards table: {}", e))?;

        match table.get(wallet).map_err(|e| anyhow!("Failed to get card: {}", e))? {
            Some(value) => Ok(Some(decode_card(value.value())?)),
            None => Ok(None),
        }
    }

    /// Check and insert inside one write transaction. redb admits a single
    /// writer at a time, so concurrent calls for one wallet serialize here.
    pub fn insert_card_if_absent(&self, card: NewCard) -> Result<InsertOutcome> {
        let key = card.wallet_address.to_string();

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let outcome;
        {
            let mut table = write_txn.open_table(CARDS)
                .map_err(|e| anyhow!("Failed to open cards table: {}", e))?;

            let existing = table
                .get(key.as_str())
                .map_err(|e| anyhow!("Failed to get card: {}", e))?
                .map(|value| decode_card(value.value()))
                .transpose()?;

            outcome = match existing {
                Some(found) => InsertOutcome::Exists(found),
                None => {
                    let card = card.into_card(Utc::now());
                    let value = serde_json::to_vec(&card)
                        .map_err(|e| anyhow!("Failed to serialize card: {}", e))?;
                    table.insert(key.as_str(), value.as_slice())
                        .map_err(|e| anyhow!("Failed to insert card: {}", e))?;
                    InsertOutcome::Inserted(card)
                }
            };
        }

        match &outcome {
            InsertOutcome::Inserted(_) => {
                write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
                debug!("Stored card: {}", key);
            }
            InsertOutcome::Exists(_) => {
                write_txn.abort().map_err(|e| anyhow!("Failed to abort: {}", e))?;
                debug!("Card already present: {}", key);
            }
        }
        Ok(outcome)
    }

    pub fn list_cards(&self) -> Result<Vec<Card>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(CARDS)
            .map_err(|e| anyhow!("Failed to open cards table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate cards: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            results.push(decode_card(value.value())?);
        }
        Ok(results)
    }

    /// Newest cards first. Keys are wallet addresses, so this sorts in memory.
    pub fn recent_cards(&self, limit: usize) -> Result<Vec<Card>> {
        let mut cards = self.list_cards()?;
        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        cards.truncate(limit);
        Ok(cards)
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(LocalCardStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StoreError::Backend(format!("Store task failed: {}", e)))?
            .map_err(StoreError::from)
    }
}

fn decode_card(bytes: &[u8]) -> Result<Card> {
    serde_json::from_slice(bytes).map_err(|e| anyhow!("Failed to deserialize card: {}", e))
}

#[async_trait]
impl CardStore for LocalCardStore {
    async fn find_one(&self, wallet: &WalletIdentity) -> Result<Option<Card>, StoreError> {
        let wallet = wallet.to_string();
        self.run_blocking(move |store| store.get_card(&wallet)).await
    }

    async fn insert_if_absent(&self, card: NewCard) -> Result<Card, StoreError> {
        match self.run_blocking(move |store| store.insert_card_if_absent(card)).await? {
            InsertOutcome::Inserted(card) => Ok(card),
            InsertOutcome::Exists(_) => Err(StoreError::Duplicate),
        }
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Card>, StoreError> {
        self.run_blocking(move |store| store.recent_cards(limit)).await
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
