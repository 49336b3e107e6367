//! Presentation view of cards for the gallery and profile listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::Card;
use crate::gate::Tier;

/// Shown when a card carries no display name
pub const DEFAULT_DISPLAY_NAME: &str = "Holder";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub wallet_address: String,
    pub display_name: String,
    pub tier: Tier,
    pub tagline: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        Self {
            wallet_address: card.wallet_address.to_string(),
            display_name: card
                .display_name
                .clone()
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            tier: card.tier,
            tagline: card.metadata.tagline().map(str::to_string),
            created_at: card.created_at,
        }
    }
}

impl CardView {
    /// Share link for this card's public profile page
    pub fn share_intent_url(&self, profile_url: &str) -> String {
        let text = format!(
            "Check out this amazing {} tier #HaloCard by {}! {}",
            self.tier, self.display_name, profile_url
        );
        format!("https://twitter.com/intent/tweet?text={}", urlencoding::encode(&text))
    }
}

/// Search text and tier selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryFilter {
    pub search: Option<String>,
    /// None means all tiers
    pub tier: Option<Tier>,
}

impl GalleryFilter {
    pub fn matches(&self, view: &CardView) -> bool {
        if let Some(tier) = self.tier {
            if view.tier != tier {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                view.display_name.to_lowercase().contains(&term)
                    || view
                        .tagline
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(&term))
            }
        }
    }

    pub fn apply<'a>(&self, views: &'a [CardView]) -> Vec<&'a CardView> {
        views.iter().filter(|v| self.matches(v)).collect()
    }
}

/// Per-tier totals for the filter badges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub all: usize,
    pub angel: usize,
    pub archangel: usize,
    pub cherubim: usize,
}

impl TierCounts {
    pub fn tally(views: &[CardView]) -> Self {
        views.iter().fold(Self::default(), |mut counts, view| {
            counts.all += 1;
            match view.tier {
                Tier::Angel => counts.angel += 1,
                Tier::Archangel => counts.archangel += 1,
                Tier::Cherubim => counts.cherubim += 1,
            }
            counts
        })
    }

    pub fn get(&self, tier: Tier) -> usize {
        match tier {
            Tier::Angel => self.angel,
            Tier::Archangel => self.archangel,
            Tier::Cherubim => self.cherubim,
        }
    }
}
