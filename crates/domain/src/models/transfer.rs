//! Direct sponsor-to-dealer transfer and reclaim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request to transfer codes straight to a dealer.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct TransferCodesRequest {
    pub purchase_id: Option<Uuid>,

    #[validate(range(min = 1, max = 10000, message = "code_count must be between 1 and 10000"))]
    pub code_count: i32,

    #[validate(custom(function = "shared::validation::validate_tier_name"))]
    pub package_tier: Option<String>,
}

/// Request to reclaim every unused code a dealer holds.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ReclaimCodesRequest {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferCodesResponse {
    pub dealer_id: Uuid,
    pub transferred_count: usize,
    pub code_ids: Vec<Uuid>,
    pub transferred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReclaimCodesResponse {
    pub dealer_id: Uuid,
    pub reclaimed_count: usize,
    pub code_ids: Vec<Uuid>,
    /// Accepted dealer invitations moved to reclaimed.
    pub invitations_reclaimed: usize,
    pub reclaimed_at: DateTime<Utc>,
}
