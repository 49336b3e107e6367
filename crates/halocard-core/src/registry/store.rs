//! ============================================================================
//! Card Store - Repository contract shared by every backend
//! ============================================================================
//! The uniqueness of `walletAddress` lives here, in `insert_if_absent`:
//! implementations must make the existence check and the insert one atomic
//! step. Callers never rely on a separate check-then-create.
//! ============================================================================

use async_trait::async_trait;

use super::types::{Card, NewCard};
use crate::types::WalletIdentity;

/// Store-level failure, normalized by the registry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("card already exists")]
    Duplicate,

    #[error("{0}")]
    Backend(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Persistent collection of cards keyed by wallet
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Look up the card owned by `wallet`
    async fn find_one(&self, wallet: &WalletIdentity) -> Result<Option<Card>, StoreError>;

    /// Atomically insert unless a card for the same wallet exists.
    /// Returns [`StoreError::Duplicate`] when it does.
    async fn insert_if_absent(&self, card: NewCard) -> Result<Card, StoreError>;

    /// Cards ordered by `created_at` descending, at most `limit`
    async fn find_recent(&self, limit: usize) -> Result<Vec<Card>, StoreError>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Classification of a raw store error message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreErrorKind {
    /// Uniqueness violation on walletAddress
    Duplicate,
    /// Anything else
    Other,
}

/// Classify a store error message. The create function reports
/// `card_exists`; a raw unique-index violation surfaces as E11000.
pub fn classify_store_error(error: &str) -> StoreErrorKind {
    let lower = error.to_lowercase();

    if lower.contains("card_exists")
        || lower.contains("duplicate key")
        || lower.contains("e11000")
    {
        return StoreErrorKind::Duplicate;
    }

    StoreErrorKind::Other
}

impl StoreError {
    /// Build a store error from a backend message, detecting conflicts
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        match classify_store_error(&message) {
            StoreErrorKind::Duplicate => StoreError::Duplicate,
            StoreErrorKind::Other => StoreError::Backend(message),
        }
    }
}
