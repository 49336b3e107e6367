//! ============================================================================
//! Gate Types - Tiers, balances and gate status
//! ============================================================================
//! Defines the HaloCard tiers derived from token holdings and the status
//! view-model recomputed on every wallet change.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HaloCard tier, ordered by ascending privilege
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Tier {
    #[default]
    Angel,
    Archangel,
    Cherubim,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Angel, Tier::Archangel, Tier::Cherubim];

    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::Angel => "Angel",
            Tier::Archangel => "Archangel",
            Tier::Cherubim => "Cherubim",
        }
    }

    /// Next tier up, if any
    pub fn next(&self) -> Option<Tier> {
        match self {
            Tier::Angel => Some(Tier::Archangel),
            Tier::Archangel => Some(Tier::Cherubim),
            Tier::Cherubim => None,
        }
    }

    /// Minimum UI amount for this tier under the given breakpoints
    pub fn required_amount(&self, breakpoints: &TierBreakpoints) -> f64 {
        match self {
            Tier::Angel => 0.0,
            Tier::Archangel => breakpoints.archangel,
            Tier::Cherubim => breakpoints.cherubim,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "angel" => Ok(Tier::Angel),
            "archangel" => Ok(Tier::Archangel),
            "cherubim" => Ok(Tier::Cherubim),
            other => Err(format!(
                "Unknown tier '{}'. Valid values: angel, archangel, cherubim",
                other
            )),
        }
    }
}

/// Tier lower bounds in UI units (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBreakpoints {
    pub archangel: f64,
    pub cherubim: f64,
}

impl TierBreakpoints {
    /// Tier for a human-readable amount
    pub fn tier_for_ui(&self, amount: f64) -> Tier {
        match amount {
            x if x >= self.cherubim => Tier::Cherubim,
            x if x >= self.archangel => Tier::Archangel,
            _ => Tier::Angel,
        }
    }
}

/// Holding of the gating token for one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub raw_amount: u128,
    pub ui_amount: f64,
    pub decimals: u8,
    pub mint_address: String,
}

impl TokenBalance {
    pub fn zero(mint_address: &str, decimals: u8) -> Self {
        Self {
            raw_amount: 0,
            ui_amount: 0.0,
            decimals,
            mint_address: mint_address.to_string(),
        }
    }
}

/// Everything needed to turn a balance into a gate decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    pub mint_address: String,
    pub decimals: u8,
    pub min_holdings_raw: u128,
    pub breakpoints: TierBreakpoints,
}

impl GatePolicy {
    fn scale(&self) -> f64 {
        10f64.powi(self.decimals as i32)
    }

    /// Convert a UI amount to raw units, rounding to the nearest unit
    pub fn to_raw(&self, ui_amount: f64) -> u128 {
        (ui_amount * self.scale()).round().max(0.0) as u128
    }

    pub fn to_ui(&self, raw: u128) -> f64 {
        raw as f64 / self.scale()
    }

    pub fn required_ui(&self) -> f64 {
        self.to_ui(self.min_holdings_raw)
    }

    /// Tier from a raw amount. Breakpoints are compared in raw units so
    /// admission and tier come from the same integer.
    pub fn tier_for_raw(&self, raw: u128) -> Tier {
        if raw >= self.to_raw(self.breakpoints.cherubim) {
            Tier::Cherubim
        } else if raw >= self.to_raw(self.breakpoints.archangel) {
            Tier::Archangel
        } else {
            Tier::Angel
        }
    }

    pub fn is_admitted(&self, raw: u128) -> bool {
        raw >= self.min_holdings_raw
    }

    /// Decide admission and tier for a fetched balance
    pub fn status_for(&self, balance: TokenBalance) -> GateStatus {
        let raw = balance.raw_amount;
        let tier = self.tier_for_raw(raw);
        let ui = self.to_ui(raw);
        let next_tier = tier.next();
        let tokens_to_next_tier =
            next_tier.map(|t| (t.required_amount(&self.breakpoints) - ui).max(0.0));

        GateStatus {
            admitted: self.is_admitted(raw),
            balance,
            required_raw: self.min_holdings_raw,
            required_ui: self.required_ui(),
            tier,
            loading: false,
            next_tier,
            tokens_to_next_tier,
        }
    }

    /// Status for a disconnected wallet or a failed lookup
    pub fn not_admitted(&self) -> GateStatus {
        self.status_for(TokenBalance::zero(&self.mint_address, self.decimals))
    }
}

/// Gate view-model for the connected wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateStatus {
    pub admitted: bool,
    pub balance: TokenBalance,
    pub required_raw: u128,
    pub required_ui: f64,
    pub tier: Tier,
    /// True only while an evaluation for the current wallet is in flight
    pub loading: bool,
    pub next_tier: Option<Tier>,
    pub tokens_to_next_tier: Option<f64>,
}

impl GateStatus {
    /// Initial state before the first evaluation resolves
    pub fn pending(policy: &GatePolicy) -> Self {
        Self {
            loading: true,
            ..policy.not_admitted()
        }
    }

    /// UI tokens still missing to clear the gate
    pub fn shortfall(&self) -> f64 {
        if self.admitted {
            0.0
        } else {
            (self.required_ui - self.balance.ui_amount).max(0.0)
        }
    }

    pub fn balance_formatted(&self) -> String {
        format_balance(self.balance.ui_amount)
    }
}

/// Format balance with K/M/B suffixes
pub fn format_balance(amount: f64) -> String {
    if amount >= 1_000_000_000.0 {
        format!("{:.2}B", amount / 1_000_000_000.0)
    } else if amount >= 1_000_000.0 {
        format!("{:.2}M", amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("{:.2}K", amount / 1_000.0)
    } else {
        format!("{:.2}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINT: &str = "ArwBHrqR721SVSqnrk6MAwvwbFZ2cvadyGyHdKxobonk";

    fn policy() -> GatePolicy {
        GatePolicy {
            mint_address: MINT.to_string(),
            decimals: 9,
            min_holdings_raw: 500_000_000_000,
            breakpoints: TierBreakpoints {
                archangel: 2_500.0,
                cherubim: 10_000.0,
            },
        }
    }

    fn balance(raw: u128) -> TokenBalance {
        TokenBalance {
            raw_amount: raw,
            ui_amount: raw as f64 / 1e9,
            decimals: 9,
            mint_address: MINT.to_string(),
        }
    }

    #[test]
    fn test_tier_for_ui_boundaries() {
        let bp = policy().breakpoints;
        assert_eq!(bp.tier_for_ui(0.0), Tier::Angel);
        assert_eq!(bp.tier_for_ui(2_499.99), Tier::Angel);
        assert_eq!(bp.tier_for_ui(2_500.0), Tier::Archangel);
        assert_eq!(bp.tier_for_ui(9_999.99), Tier::Archangel);
        assert_eq!(bp.tier_for_ui(10_000.0), Tier::Cherubim);
        assert_eq!(bp.tier_for_ui(12_000.0), Tier::Cherubim);
    }

    #[test]
    fn test_tier_for_raw_boundaries() {
        let p = policy();
        assert_eq!(p.tier_for_raw(2_499_990_000_000), Tier::Angel);
        assert_eq!(p.tier_for_raw(2_500_000_000_000), Tier::Archangel);
        assert_eq!(p.tier_for_raw(9_999_990_000_000), Tier::Archangel);
        assert_eq!(p.tier_for_raw(10_000_000_000_000), Tier::Cherubim);
        // one raw unit below the breakpoint stays in the lower tier
        assert_eq!(p.tier_for_raw(9_999_999_999_999), Tier::Archangel);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Angel < Tier::Archangel);
        assert!(Tier::Archangel < Tier::Cherubim);
        assert_eq!(Tier::ALL.iter().max(), Some(&Tier::Cherubim));
    }

    #[test]
    fn test_tier_parse_and_serde() {
        assert_eq!("ARCHANGEL".parse::<Tier>(), Ok(Tier::Archangel));
        assert!("seraph".parse::<Tier>().is_err());
        assert_eq!(serde_json::to_string(&Tier::Cherubim).unwrap(), "\"Cherubim\"");
    }

    #[test]
    fn test_admission_below_threshold() {
        let p = policy();
        for raw in [0u128, 1, 499_999_999_999] {
            let status = p.status_for(balance(raw));
            assert!(!status.admitted, "raw {} should not be admitted", raw);
            assert_eq!(status.tier, Tier::Angel);
        }
        assert!(p.status_for(balance(500_000_000_000)).admitted);
    }

    #[test]
    fn test_status_for_cherubim_holder() {
        let status = policy().status_for(balance(12_000_000_000_000));
        assert!(status.admitted);
        assert_eq!(status.tier, Tier::Cherubim);
        assert_eq!(status.next_tier, None);
        assert_eq!(status.tokens_to_next_tier, None);
        assert_eq!(status.shortfall(), 0.0);
        assert_eq!(status.balance_formatted(), "12.00K");
    }

    #[test]
    fn test_next_tier_progress() {
        let status = policy().status_for(balance(1_000_000_000_000));
        assert_eq!(status.tier, Tier::Angel);
        assert_eq!(status.next_tier, Some(Tier::Archangel));
        assert_eq!(status.tokens_to_next_tier, Some(1_500.0));
    }

    #[test]
    fn test_not_admitted_and_pending() {
        let p = policy();
        let status = p.not_admitted();
        assert!(!status.admitted);
        assert!(!status.loading);
        assert_eq!(status.tier, Tier::Angel);
        assert_eq!(status.shortfall(), 500.0);

        assert!(GateStatus::pending(&p).loading);
    }

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(500.0), "500.00");
        assert_eq!(format_balance(1500.0), "1.50K");
        assert_eq!(format_balance(1_500_000.0), "1.50M");
        assert_eq!(format_balance(1_500_000_000.0), "1.50B");
    }
}
