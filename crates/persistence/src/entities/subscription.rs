//! Subscription entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Subscription, SubscriptionStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for subscription_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
pub enum SubscriptionStatusDb {
    Active,
    Pending,
    Expired,
    Cancelled,
}

impl From<SubscriptionStatusDb> for SubscriptionStatus {
    fn from(db: SubscriptionStatusDb) -> Self {
        match db {
            SubscriptionStatusDb::Active => SubscriptionStatus::Active,
            SubscriptionStatusDb::Pending => SubscriptionStatus::Pending,
            SubscriptionStatusDb::Expired => SubscriptionStatus::Expired,
            SubscriptionStatusDb::Cancelled => SubscriptionStatus::Cancelled,
        }
    }
}

impl From<SubscriptionStatus> for SubscriptionStatusDb {
    fn from(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::Active => SubscriptionStatusDb::Active,
            SubscriptionStatus::Pending => SubscriptionStatusDb::Pending,
            SubscriptionStatus::Expired => SubscriptionStatusDb::Expired,
            SubscriptionStatus::Cancelled => SubscriptionStatusDb::Cancelled,
        }
    }
}

/// Database row mapping for the user_subscriptions table.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier_id: Uuid,
    pub status: SubscriptionStatusDb,
    pub is_sponsored: bool,
    pub sponsor_id: Option<Uuid>,
    pub sponsorship_code_id: Option<Uuid>,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub previous_subscription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<SubscriptionEntity> for Subscription {
    fn from(entity: SubscriptionEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            tier_id: entity.tier_id,
            status: entity.status.into(),
            is_sponsored: entity.is_sponsored,
            sponsor_id: entity.sponsor_id,
            sponsorship_code_id: entity.sponsorship_code_id,
            payment_method: entity.payment_method,
            payment_reference: entity.payment_reference,
            start_date: entity.start_date,
            end_date: entity.end_date,
            previous_subscription_id: entity.previous_subscription_id,
            created_at: entity.created_at,
        }
    }
}
