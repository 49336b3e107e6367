//! ============================================================================
//! Registry Types - Cards and their metadata
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::gate::Tier;
use crate::types::{HaloError, WalletIdentity};

pub const MAX_DISPLAY_NAME_CHARS: usize = 20;
pub const MAX_TAGLINE_CHARS: usize = 60;

pub const TAGLINE_KEY: &str = "tagline";
pub const SOURCE_KEY: &str = "source";

/// The persisted per-wallet record. One per wallet; tier is frozen at mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub wallet_address: WalletIdentity,
    #[serde(default)]
    pub display_name: Option<String>,
    pub tier: Tier,
    #[serde(default)]
    pub metadata: CardMetadata,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Open key-value bag attached to a card. Known keys are checked by
/// [`CardMetadata::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardMetadata(BTreeMap<String, Value>);

impl CardMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set the tagline; blank taglines remove the key
    pub fn set_tagline(&mut self, tagline: Option<&str>) {
        match tagline.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => self.insert(TAGLINE_KEY, t),
            None => {
                self.0.remove(TAGLINE_KEY);
            }
        }
    }

    pub fn tagline(&self) -> Option<&str> {
        self.get(TAGLINE_KEY).and_then(Value::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.get(SOURCE_KEY).and_then(Value::as_str)
    }

    pub fn validate(&self) -> Result<(), HaloError> {
        if self.0.keys().any(|k| k.trim().is_empty()) {
            return Err(HaloError::InvalidInput("metadata keys must not be empty".to_string()));
        }

        if let Some(tagline) = self.get(TAGLINE_KEY) {
            let text = tagline
                .as_str()
                .ok_or_else(|| HaloError::InvalidInput("tagline must be a string".to_string()))?;
            if text.chars().count() > MAX_TAGLINE_CHARS {
                return Err(HaloError::InvalidInput(format!(
                    "tagline exceeds {} characters",
                    MAX_TAGLINE_CHARS
                )));
            }
        }

        if let Some(source) = self.get(SOURCE_KEY) {
            if !source.is_string() {
                return Err(HaloError::InvalidInput("source must be a string".to_string()));
            }
        }

        Ok(())
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

impl From<BTreeMap<String, Value>> for CardMetadata {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Validated input for the store's insert-if-absent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCard {
    pub wallet_address: WalletIdentity,
    pub display_name: Option<String>,
    pub tier: Tier,
    pub metadata: CardMetadata,
}

impl NewCard {
    /// Validate and normalize caller input. Runs before any store call.
    pub fn new(
        wallet: &WalletIdentity,
        display_name: Option<&str>,
        tier: Tier,
        metadata: Option<CardMetadata>,
    ) -> Result<Self, HaloError> {
        if !wallet.is_connected() {
            return Err(HaloError::InvalidInput("wallet not connected".to_string()));
        }

        let metadata = metadata.unwrap_or_default();
        metadata.validate()?;

        Ok(Self {
            wallet_address: wallet.clone(),
            display_name: normalize_display_name(display_name)?,
            tier,
            metadata,
        })
    }

    /// Materialize the card as a store would persist it
    pub fn into_card(self, created_at: DateTime<Utc>) -> Card {
        Card {
            wallet_address: self.wallet_address,
            display_name: self.display_name,
            tier: self.tier,
            metadata: self.metadata,
            created_at,
            updated_at: None,
        }
    }
}

/// Trim a display name; blank names become None
pub fn normalize_display_name(name: Option<&str>) -> Result<Option<String>, HaloError> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(HaloError::InvalidInput(format!(
            "display name exceeds {} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }
    Ok(Some(name.to_string()))
}

/// Result of an existence check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardLookup {
    pub exists: bool,
    pub card: Option<Card>,
}

impl From<Option<Card>> for CardLookup {
    fn from(card: Option<Card>) -> Self {
        Self {
            exists: card.is_some(),
            card,
        }
    }
}
