//! ============================================================================
//! Mint Flow - Gate check, existence check, create
//! ============================================================================
//! One attempt walks:
//!   Idle -> Checking -> AlreadyExists -> Idle
//!   Idle -> Checking -> Creating -> Created -> Idle
//!   Idle -> Checking -> Creating -> Failed -> Idle
//!
//! Validation and the gate decision happen before the flow leaves Idle.
//! Every attempt ends in Idle; nothing is retried in the background.
//! ============================================================================

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::gate::{GateStatus, Tier};
use crate::liveness::Liveness;
use crate::registry::{normalize_display_name, Card, CardMetadata, CardRegistry, SOURCE_KEY};
use crate::types::{HaloError, WalletIdentity};

const SHARE_INTENT_BASE: &str = "https://twitter.com/intent/tweet?text=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintState {
    Idle,
    Checking,
    AlreadyExists,
    Creating,
    Created,
    Failed,
}

impl MintState {
    pub fn can_transition_to(self, next: MintState) -> bool {
        use MintState::*;
        matches!(
            (self, next),
            (Idle, Checking)
                | (Checking, AlreadyExists)
                | (Checking, Creating)
                | (Checking, Failed)
                | (Creating, Created)
                | (Creating, AlreadyExists)
                | (Creating, Failed)
                | (AlreadyExists, Idle)
                | (Created, Idle)
                | (Failed, Idle)
        )
    }
}

/// Form input for one mint attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MintRequest {
    pub display_name: String,
    pub tagline: Option<String>,
}

impl MintRequest {
    pub fn new(display_name: impl Into<String>, tagline: Option<&str>) -> Self {
        Self {
            display_name: display_name.into(),
            tagline: tagline.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MintOutcome {
    Created { card: Card },
    AlreadyExists { wallet: WalletIdentity },
    Failed { message: String },
}

impl MintOutcome {
    /// Profile path to navigate to, if any
    pub fn redirect(&self) -> Option<String> {
        match self {
            MintOutcome::Created { card } => Some(profile_path(&card.wallet_address)),
            MintOutcome::AlreadyExists { wallet } => Some(profile_path(wallet)),
            MintOutcome::Failed { .. } => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, MintOutcome::Failed { .. })
    }
}

pub fn profile_path(wallet: &WalletIdentity) -> String {
    format!("/u/{}", wallet)
}

/// Share link announcing a freshly minted card
pub fn share_intent_url(tier: Tier) -> String {
    let text = format!(
        "Gate cleared. Minted my #HaloCard - tier {}. Claim yours: halocard.xyz",
        tier
    );
    format!("{}{}", SHARE_INTENT_BASE, urlencoding::encode(&text))
}

/// Puts the flow back to Idle if an attempt is abandoned mid-flight
struct IdleOnDrop<'a>(&'a watch::Sender<MintState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| {
            if *state == MintState::Idle {
                false
            } else {
                warn!("Mint attempt abandoned in {:?}, resetting to Idle", state);
                *state = MintState::Idle;
                true
            }
        });
    }
}

pub struct MintFlow {
    registry: CardRegistry,
    state: watch::Sender<MintState>,
    liveness: Liveness,
    existing: RwLock<Option<bool>>,
    card_source: String,
}

impl MintFlow {
    pub fn new(registry: CardRegistry, card_source: impl Into<String>) -> Self {
        let (state, _) = watch::channel(MintState::Idle);
        Self {
            registry,
            state,
            liveness: Liveness::new(),
            existing: RwLock::new(None),
            card_source: card_source.into(),
        }
    }

    pub fn state(&self) -> MintState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MintState> {
        self.state.subscribe()
    }

    /// Last existence answer for the connected wallet, None when unknown
    pub async fn existing_hint(&self) -> Option<bool> {
        *self.existing.read().await
    }

    /// Refresh the "already minted" hint for a newly connected wallet.
    /// Answers that arrive after another wallet change are dropped.
    pub async fn check_existing(&self, wallet: &WalletIdentity) -> Option<bool> {
        let ticket = self.liveness.advance();

        let answer = if wallet.is_connected() {
            match self.registry.exists(wallet).await {
                Ok(lookup) => Some(lookup.exists),
                Err(e) => {
                    warn!("Existence check failed for {}: {}", wallet.short(), e);
                    None
                }
            }
        } else {
            None
        };

        let mut existing = self.existing.write().await;
        if ticket.is_live() {
            *existing = answer;
        } else {
            debug!("Dropping stale existence answer for {}", wallet.short());
        }
        answer
    }

    /// Run one mint attempt for `wallet` with the tier from `gate`.
    ///
    /// Errors are input and gate rejections; store outcomes come back as
    /// [`MintOutcome`].
    pub async fn mint(
        &self,
        wallet: &WalletIdentity,
        gate: &GateStatus,
        request: MintRequest,
    ) -> Result<MintOutcome, HaloError> {
        if !wallet.is_connected() {
            return Err(HaloError::InvalidInput("wallet not connected".to_string()));
        }
        let display_name = normalize_display_name(Some(&request.display_name))?
            .ok_or_else(|| HaloError::InvalidInput("username is required".to_string()))?;

        let mut metadata = CardMetadata::new();
        metadata.set_tagline(request.tagline.as_deref());
        metadata.insert(SOURCE_KEY, self.card_source.as_str());
        metadata.validate()?;

        if !gate.admitted {
            return Err(HaloError::GateDenied {
                shortfall: gate.shortfall(),
            });
        }

        let started = self.state.send_if_modified(|state| {
            if *state == MintState::Idle {
                *state = MintState::Checking;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(HaloError::InvalidInput("a mint is already in progress".to_string()));
        }
        let _reset = IdleOnDrop(&self.state);
        let ticket = self.liveness.observe();

        let outcome = self.run(wallet, &display_name, gate.tier, metadata).await;

        if matches!(outcome, MintOutcome::Created { .. } | MintOutcome::AlreadyExists { .. }) {
            let mut existing = self.existing.write().await;
            if ticket.is_live() {
                *existing = Some(true);
            } else {
                debug!("Wallet changed during mint for {}, keeping hint", wallet.short());
            }
        }
        self.transition(MintState::Idle);
        Ok(outcome)
    }

    async fn run(
        &self,
        wallet: &WalletIdentity,
        display_name: &str,
        tier: Tier,
        metadata: CardMetadata,
    ) -> MintOutcome {
        match self.registry.exists(wallet).await {
            Ok(lookup) if lookup.exists => {
                info!("Wallet {} already holds a card", wallet.short());
                self.transition(MintState::AlreadyExists);
                return MintOutcome::AlreadyExists {
                    wallet: wallet.clone(),
                };
            }
            Ok(_) => {}
            Err(e) => return self.fail(e),
        }

        self.transition(MintState::Creating);
        match self
            .registry
            .create(wallet, Some(display_name), tier, Some(metadata))
            .await
        {
            Ok(card) => {
                self.transition(MintState::Created);
                MintOutcome::Created { card }
            }
            // Another session won between our check and create
            Err(HaloError::CardExists { .. }) => {
                self.transition(MintState::AlreadyExists);
                MintOutcome::AlreadyExists {
                    wallet: wallet.clone(),
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&self, error: HaloError) -> MintOutcome {
        warn!("Mint failed: {}", error);
        self.transition(MintState::Failed);
        MintOutcome::Failed {
            message: error.to_string(),
        }
    }

    fn transition(&self, next: MintState) {
        let previous = self.state.send_replace(next);
        if !previous.can_transition_to(next) {
            warn!("Unexpected mint transition {:?} -> {:?}", previous, next);
        }
    }
}
