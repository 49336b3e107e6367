//! ============================================================================
//! Registry Module - Persistent HaloCards, one per wallet
//! ============================================================================
//! `CardRegistry` sits on a `CardStore` backend:
//! - `AtlasCardStore`: App Services HTTP API (remote collection)
//! - `LocalCardStore`: embedded redb file
//! - `MemoryCardStore`: in-process map
//!
//! ## Usage
//! ```rust,ignore
//! use halocard_core::registry::{CardRegistry, LocalCardStore};
//!
//! let store = LocalCardStore::open(&path)?;
//! let registry = CardRegistry::new(Arc::new(store));
//! let card = registry.create(&wallet, Some("CloudWalker"), tier, None).await?;
//! ```
//! ============================================================================

mod atlas;
mod client;
mod local;
mod memory;
mod store;
mod types;
mod view;

pub use atlas::AtlasCardStore;
pub use client::CardRegistry;
pub use local::{InsertOutcome, LocalCardStore};
pub use memory::MemoryCardStore;
pub use store::{classify_store_error, CardStore, StoreError, StoreErrorKind};
pub use types::{
    normalize_display_name, Card, CardLookup, CardMetadata, NewCard, MAX_DISPLAY_NAME_CHARS,
    MAX_TAGLINE_CHARS, SOURCE_KEY, TAGLINE_KEY,
};
pub use view::{CardView, GalleryFilter, TierCounts, DEFAULT_DISPLAY_NAME};
