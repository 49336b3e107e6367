//! ============================================================================
//! HALOCARD-CORE: Token gate and card registry
//! ============================================================================
//! This crate handles the HaloCard backend logic:
//! - Token gate: SPL balance via Solana JSON-RPC, admission and tier
//! - Card registry: one card per wallet over Atlas, redb or memory stores
//! - Mint flow: gate -> existence check -> atomic create
//! - Gallery views and filters
//! ============================================================================

pub mod config;
pub mod gate;
pub mod liveness;
pub mod mint;
pub mod registry;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use config::{ConfigError, GateConfig, HaloConfig, StoreConfig};
pub use gate::{GateStatus, GateWatcher, Tier, TokenGate};
pub use liveness::{Liveness, LivenessTicket};
pub use mint::{MintFlow, MintOutcome, MintRequest, MintState};
pub use registry::{Card, CardLookup, CardMetadata, CardRegistry, CardStore, CardView};
pub use service::{open_store, HaloService, StoreChoice};
