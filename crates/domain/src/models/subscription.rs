//! Subscriptions created by redeeming a code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::code::CodeValidity;
use super::tier::TierName;

/// Payment method recorded on subscriptions paid for with a code.
pub const SPONSORSHIP_PAYMENT_METHOD: &str = "Sponsorship";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    /// Queued behind an active sponsored subscription.
    Pending,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier_id: Uuid,
    pub status: SubscriptionStatus,
    pub is_sponsored: bool,
    pub sponsor_id: Option<Uuid>,
    pub sponsorship_code_id: Option<Uuid>,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Active subscription this one is queued behind.
    pub previous_subscription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date.map_or(true, |end| end > now)
    }
}

/// Request to redeem a code.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RedeemCodeRequest {
    #[validate(length(min = 1, max = 64, message = "Code is required"))]
    pub code: String,
}

/// Request to check a code without redeeming it.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ValidateCodeRequest {
    #[validate(length(min = 1, max = 64, message = "Code is required"))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ValidateCodeResponse {
    pub code: String,
    pub validity: CodeValidity,
    pub is_valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RedeemCodeResponse {
    pub subscription_id: Uuid,
    pub status: SubscriptionStatus,
    pub tier: TierName,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// True when the subscription was queued behind an active one.
    pub queued: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn subscription(status: SubscriptionStatus, end: Option<DateTime<Utc>>) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tier_id: Uuid::new_v4(),
            status,
            is_sponsored: true,
            sponsor_id: None,
            sponsorship_code_id: None,
            payment_method: SPONSORSHIP_PAYMENT_METHOD.to_string(),
            payment_reference: None,
            start_date: None,
            end_date: end,
            previous_subscription_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_active_at() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(subscription(SubscriptionStatus::Active, Some(now + Duration::days(1))).is_active_at(now));
        assert!(!subscription(SubscriptionStatus::Active, Some(now)).is_active_at(now));
        assert!(!subscription(SubscriptionStatus::Pending, None).is_active_at(now));
    }
}
