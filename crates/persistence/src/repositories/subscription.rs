//! User subscription repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::Subscription;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{SubscriptionEntity, SubscriptionStatusDb};
use crate::metrics::QueryTimer;

/// Repository for subscriptions created by redemption.
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    /// Creates a new SubscriptionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Lock the user's running sponsored subscription, if any.
    pub async fn lock_active_sponsored(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_active_sponsored_subscription");
        let result = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            SELECT id, user_id, tier_id, status, is_sponsored, sponsor_id, sponsorship_code_id,
                   payment_method, payment_reference, start_date, end_date,
                   previous_subscription_id, created_at
            FROM user_subscriptions
            WHERE user_id = $1
              AND status = 'active'
              AND is_sponsored = true
              AND (end_date IS NULL OR end_date > $2)
            ORDER BY end_date DESC NULLS FIRST
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Insert a subscription.
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        subscription: &Subscription,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_subscription");
        let status: SubscriptionStatusDb = subscription.status.into();
        sqlx::query(
            r#"
            INSERT INTO user_subscriptions (
                id, user_id, tier_id, status, is_sponsored, sponsor_id, sponsorship_code_id,
                payment_method, payment_reference, start_date, end_date,
                previous_subscription_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.user_id)
        .bind(subscription.tier_id)
        .bind(status)
        .bind(subscription.is_sponsored)
        .bind(subscription.sponsor_id)
        .bind(subscription.sponsorship_code_id)
        .bind(&subscription.payment_method)
        .bind(&subscription.payment_reference)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.previous_subscription_id)
        .bind(subscription.created_at)
        .execute(&mut *conn)
        .await?;
        timer.record();
        Ok(())
    }
}
