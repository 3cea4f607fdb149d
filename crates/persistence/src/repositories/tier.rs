//! Subscription tier repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::SubscriptionTierEntity;
use crate::metrics::QueryTimer;

/// Repository for subscription tier lookups.
#[derive(Clone)]
pub struct TierRepository {
    pool: PgPool,
}

impl TierRepository {
    /// Creates a new TierRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find tier by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SubscriptionTierEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_tier_by_id");
        let result = sqlx::query_as::<_, SubscriptionTierEntity>(
            r#"
            SELECT id, name, display_name, min_purchase_quantity, max_purchase_quantity,
                   subscription_days, is_active, created_at
            FROM subscription_tiers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find tier by its short name (S, M, L, XL).
    pub async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SubscriptionTierEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_tier_by_name");
        let result = sqlx::query_as::<_, SubscriptionTierEntity>(
            r#"
            SELECT id, name, display_name, min_purchase_quantity, max_purchase_quantity,
                   subscription_days, is_active, created_at
            FROM subscription_tiers
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
