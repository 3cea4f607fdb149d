//! Subscription tier entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::error::StoreError;
use domain::models::{SubscriptionTier, TierName};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the subscription_tiers table.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionTierEntity {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub min_purchase_quantity: i32,
    pub max_purchase_quantity: i32,
    pub subscription_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionTierEntity> for SubscriptionTier {
    type Error = StoreError;

    fn try_from(entity: SubscriptionTierEntity) -> Result<Self, Self::Error> {
        let name: TierName = entity
            .name
            .parse()
            .map_err(|e| StoreError::Backend(format!("Tier {}: {}", entity.id, e)))?;

        Ok(Self {
            id: entity.id,
            name,
            display_name: entity.display_name,
            min_purchase_quantity: entity.min_purchase_quantity,
            max_purchase_quantity: entity.max_purchase_quantity,
            subscription_days: entity.subscription_days,
            is_active: entity.is_active,
        })
    }
}
