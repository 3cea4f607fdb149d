//! Subscription tiers that codes are issued for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Subscription size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierName {
    S,
    M,
    L,
    XL,
}

impl TierName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierName::S => "S",
            TierName::M => "M",
            TierName::L => "L",
            TierName::XL => "XL",
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a tier name is not one of S, M, L, XL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid tier '{0}'. Must be one of S, M, L, XL")]
pub struct UnknownTier(pub String);

impl FromStr for TierName {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "S" => Ok(TierName::S),
            "M" => Ok(TierName::M),
            "L" => Ok(TierName::L),
            "XL" => Ok(TierName::XL),
            _ => Err(UnknownTier(s.to_string())),
        }
    }
}

/// A purchasable subscription tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SubscriptionTier {
    pub id: Uuid,
    pub name: TierName,
    pub display_name: String,
    pub min_purchase_quantity: i32,
    pub max_purchase_quantity: i32,
    /// Length of a subscription activated from one of this tier's codes.
    pub subscription_days: i32,
    pub is_active: bool,
}

impl SubscriptionTier {
    /// Whether a purchase of `quantity` codes is allowed for this tier.
    pub fn accepts_quantity(&self, quantity: i32) -> bool {
        (self.min_purchase_quantity..=self.max_purchase_quantity).contains(&quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_name_parse_is_case_insensitive() {
        assert_eq!("m".parse::<TierName>().unwrap(), TierName::M);
        assert_eq!(" xl ".parse::<TierName>().unwrap(), TierName::XL);
        assert!("XXL".parse::<TierName>().is_err());
        assert!("".parse::<TierName>().is_err());
    }

    #[test]
    fn test_tier_name_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&TierName::XL).unwrap(), "\"XL\"");
        assert_eq!(TierName::S.to_string(), "S");
    }

    #[test]
    fn test_accepts_quantity_bounds_inclusive() {
        let tier = SubscriptionTier {
            id: Uuid::new_v4(),
            name: TierName::M,
            display_name: "Medium".to_string(),
            min_purchase_quantity: 10,
            max_purchase_quantity: 100,
            subscription_days: 30,
            is_active: true,
        };
        assert!(tier.accepts_quantity(10));
        assert!(tier.accepts_quantity(100));
        assert!(!tier.accepts_quantity(9));
        assert!(!tier.accepts_quantity(101));
    }
}
