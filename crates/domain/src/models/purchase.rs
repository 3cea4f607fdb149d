//! Sponsor purchases. A purchase is the parent of a batch of codes and is
//! immutable after creation; usage is derived from its codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::code::PoolStats;
use super::tier::TierName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SponsorshipPurchase {
    pub id: Uuid,
    pub sponsor_id: Uuid,
    pub tier_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_amount_cents: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub payment_status: PaymentStatus,
    pub code_prefix: String,
    pub validity_days: i32,
    pub company_name: Option<String>,
    pub invoice_address: Option<String>,
    pub tax_number: Option<String>,
    pub notes: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

/// Request to buy a batch of codes.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct PurchaseCodesRequest {
    #[validate(custom(function = "shared::validation::validate_tier_name"))]
    pub tier: String,

    #[validate(range(min = 1, max = 100000, message = "Quantity must be between 1 and 100000"))]
    pub quantity: i32,

    #[validate(range(
        min = 0i64,
        max = 100_000_000_000i64,
        message = "Unit price must be between 0 and 100000000000 cents"
    ))]
    #[serde(default)]
    pub unit_price_cents: i64,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    #[serde(default = "default_currency")]
    pub currency: String,

    #[validate(length(max = 50))]
    pub payment_method: Option<String>,

    #[validate(length(max = 200))]
    pub payment_reference: Option<String>,

    #[validate(custom(function = "shared::validation::validate_code_prefix"))]
    pub code_prefix: Option<String>,

    #[validate(range(min = 1, max = 3650, message = "Validity must be between 1 and 3650 days"))]
    pub validity_days: Option<i32>,

    #[validate(length(max = 200))]
    pub company_name: Option<String>,

    #[validate(length(max = 500))]
    pub invoice_address: Option<String>,

    #[validate(length(max = 50))]
    pub tax_number: Option<String>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn default_currency() -> String {
    "TRY".to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PurchaseResponse {
    pub id: Uuid,
    pub tier: TierName,
    pub quantity: i32,
    pub total_amount_cents: i64,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub purchased_at: DateTime<Utc>,
    pub codes: Vec<String>,
}

/// Usage counters for one purchase, derived from its codes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PurchaseUsage {
    pub purchase_id: Uuid,
    pub quantity: i32,
    #[serde(flatten)]
    pub stats: PoolStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_request_defaults() {
        let req: PurchaseCodesRequest = serde_json::from_value(serde_json::json!({
            "tier": "M",
            "quantity": 10
        }))
        .unwrap();
        assert_eq!(req.currency, "TRY");
        assert_eq!(req.unit_price_cents, 0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_purchase_request_rejects_bad_prefix() {
        let req: PurchaseCodesRequest = serde_json::from_value(serde_json::json!({
            "tier": "M",
            "quantity": 10,
            "code_prefix": "agri-x"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_purchase_request_bounds_unit_price() {
        let req: PurchaseCodesRequest = serde_json::from_value(serde_json::json!({
            "tier": "S",
            "quantity": 2,
            "unit_price_cents": i64::MAX
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("unit_price_cents"));
    }

    #[test]
    fn test_usage_flattens_stats() {
        let usage = PurchaseUsage {
            purchase_id: Uuid::nil(),
            quantity: 10,
            stats: PoolStats {
                total: 10,
                available: 7,
                reserved: 3,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json["available"], 7);
        assert_eq!(json["reserved"], 3);
        assert_eq!(json["quantity"], 10);
    }
}
