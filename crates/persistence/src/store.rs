//! PostgreSQL implementation of [`SponsorshipStore`].
//!
//! A transaction is a `sqlx::Transaction`; dropping it without commit
//! rolls back. Row locks come from `SELECT ... FOR UPDATE`, and the
//! candidate scans add `SKIP LOCKED` so concurrent allocations pick
//! disjoint rows instead of queueing behind each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::StoreError;
use domain::models::{
    Hold, Invitation, InvitationKind, PoolStats, SponsorshipCode, SponsorshipPurchase,
    Subscription, SubscriptionTier, TierName,
};
use domain::services::{CodeFilter, CodeOrder, InvitationQuery, SponsorshipStore};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{HoldColumns, InvitationEntity, SponsorshipCodeEntity};
use crate::repositories::{
    CodeRepository, InvitationListFilter, InvitationRepository, PurchaseRepository,
    SubscriptionRepository, TierRepository,
};

/// Sponsorship store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgSponsorshipStore {
    pool: PgPool,
    tiers: TierRepository,
    codes: CodeRepository,
    invitations: InvitationRepository,
    purchases: PurchaseRepository,
    subscriptions: SubscriptionRepository,
}

impl PgSponsorshipStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            tiers: TierRepository::new(pool.clone()),
            codes: CodeRepository::new(pool.clone()),
            invitations: InvitationRepository::new(pool.clone()),
            purchases: PurchaseRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn codes_from(rows: Vec<SponsorshipCodeEntity>) -> Result<Vec<SponsorshipCode>, StoreError> {
    rows.into_iter().map(SponsorshipCode::try_from).collect()
}

fn invitations_from(rows: Vec<InvitationEntity>) -> Result<Vec<Invitation>, StoreError> {
    rows.into_iter().map(Invitation::try_from).collect()
}

#[async_trait]
impl SponsorshipStore for PgSponsorshipStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        Ok(tx.commit().await?)
    }

    async fn find_tier_by_name(
        &self,
        name: TierName,
    ) -> Result<Option<SubscriptionTier>, StoreError> {
        self.tiers
            .find_by_name(name.as_str())
            .await?
            .map(SubscriptionTier::try_from)
            .transpose()
    }

    async fn find_tier(&self, id: Uuid) -> Result<Option<SubscriptionTier>, StoreError> {
        self.tiers
            .find_by_id(id)
            .await?
            .map(SubscriptionTier::try_from)
            .transpose()
    }

    async fn find_available_codes(
        &self,
        filter: &CodeFilter,
        order: CodeOrder,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError> {
        let rows = self
            .codes
            .find_available(filter, order, sql_limit(limit), now)
            .await?;
        codes_from(rows)
    }

    async fn find_code_by_value(&self, code: &str) -> Result<Option<SponsorshipCode>, StoreError> {
        self.codes
            .find_by_value(code)
            .await?
            .map(SponsorshipCode::try_from)
            .transpose()
    }

    async fn existing_code_values(&self, values: &[String]) -> Result<Vec<String>, StoreError> {
        Ok(self.codes.existing_values(values).await?)
    }

    async fn pool_stats(
        &self,
        sponsor_id: Uuid,
        purchase_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<PoolStats, StoreError> {
        Ok(self.codes.pool_stats(sponsor_id, purchase_id, now).await?.into())
    }

    async fn lock_available_codes(
        &self,
        tx: &mut Self::Tx,
        filter: &CodeFilter,
        order: CodeOrder,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError> {
        let rows = self
            .codes
            .lock_available(&mut **tx, filter, order, sql_limit(limit), now)
            .await?;
        codes_from(rows)
    }

    async fn lock_codes_reserved_for(
        &self,
        tx: &mut Self::Tx,
        invitation_id: Uuid,
    ) -> Result<Vec<SponsorshipCode>, StoreError> {
        let rows = self.codes.lock_reserved_for(&mut **tx, invitation_id).await?;
        codes_from(rows)
    }

    async fn lock_reclaimable_codes(
        &self,
        tx: &mut Self::Tx,
        sponsor_id: Uuid,
        dealer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError> {
        let rows = self
            .codes
            .lock_reclaimable(&mut **tx, sponsor_id, dealer_id, now)
            .await?;
        codes_from(rows)
    }

    async fn lock_code_by_value(
        &self,
        tx: &mut Self::Tx,
        code: &str,
    ) -> Result<Option<SponsorshipCode>, StoreError> {
        self.codes
            .lock_by_value(&mut **tx, code)
            .await?
            .map(SponsorshipCode::try_from)
            .transpose()
    }

    async fn swap_code(
        &self,
        tx: &mut Self::Tx,
        expected: &Hold,
        code: &SponsorshipCode,
    ) -> Result<(), StoreError> {
        let expected = HoldColumns::from(expected);
        let updated = self.codes.compare_and_swap(&mut **tx, &expected, code).await?;
        if updated == 0 {
            debug!(code_id = %code.id, "Code changed under a concurrent writer");
            return Err(StoreError::Conflict(format!(
                "code {} no longer matches its expected hold",
                code.id
            )));
        }
        Ok(())
    }

    async fn insert_codes(
        &self,
        tx: &mut Self::Tx,
        codes: &[SponsorshipCode],
    ) -> Result<(), StoreError> {
        if let Some(code) = codes.iter().find(|c| c.hold != Hold::None || c.is_used) {
            return Err(StoreError::Backend(format!(
                "code {} must be inserted unheld and unused",
                code.id
            )));
        }
        self.codes.insert_unheld(&mut **tx, codes).await?;
        Ok(())
    }

    async fn insert_invitation(
        &self,
        tx: &mut Self::Tx,
        invitation: &Invitation,
    ) -> Result<(), StoreError> {
        Ok(self.invitations.insert(&mut **tx, invitation).await?)
    }

    async fn update_invitation(
        &self,
        tx: &mut Self::Tx,
        invitation: &Invitation,
    ) -> Result<(), StoreError> {
        let updated = self.invitations.update(&mut **tx, invitation).await?;
        if updated == 0 {
            return Err(StoreError::Backend(format!(
                "invitation {} does not exist",
                invitation.id
            )));
        }
        Ok(())
    }

    async fn lock_invitation(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
    ) -> Result<Option<Invitation>, StoreError> {
        self.invitations
            .lock_by_id(&mut **tx, id)
            .await?
            .map(Invitation::try_from)
            .transpose()
    }

    async fn lock_invitation_by_token(
        &self,
        tx: &mut Self::Tx,
        kind: InvitationKind,
        token: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        self.invitations
            .lock_by_token(&mut **tx, kind.into(), token)
            .await?
            .map(Invitation::try_from)
            .transpose()
    }

    async fn lock_overdue_invitations(
        &self,
        tx: &mut Self::Tx,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Invitation>, StoreError> {
        let rows = self
            .invitations
            .lock_overdue(&mut **tx, now, sql_limit(limit))
            .await?;
        invitations_from(rows)
    }

    async fn lock_accepted_dealer_invitations(
        &self,
        tx: &mut Self::Tx,
        sponsor_id: Uuid,
        dealer_id: Uuid,
    ) -> Result<Vec<Invitation>, StoreError> {
        let rows = self
            .invitations
            .lock_accepted_dealer(&mut **tx, sponsor_id, dealer_id)
            .await?;
        invitations_from(rows)
    }

    async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, StoreError> {
        self.invitations
            .find_by_id(id)
            .await?
            .map(Invitation::try_from)
            .transpose()
    }

    async fn list_invitations(
        &self,
        query: &InvitationQuery,
    ) -> Result<Vec<Invitation>, StoreError> {
        let filter = InvitationListFilter {
            sponsor_id: query.sponsor_id,
            kind: query.kind.into(),
            status: query.status.map(Into::into),
            after: query.after.as_ref().map(|c| (c.created_at, c.id)),
            limit: query.limit,
            now: query.now,
        };
        let rows = self.invitations.list(&filter).await?;
        invitations_from(rows)
    }

    async fn insert_purchase(
        &self,
        tx: &mut Self::Tx,
        purchase: &SponsorshipPurchase,
    ) -> Result<(), StoreError> {
        Ok(self.purchases.insert(&mut **tx, purchase).await?)
    }

    async fn find_purchase(&self, id: Uuid) -> Result<Option<SponsorshipPurchase>, StoreError> {
        Ok(self.purchases.find_by_id(id).await?.map(Into::into))
    }

    async fn find_active_sponsored_subscription(
        &self,
        tx: &mut Self::Tx,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .subscriptions
            .lock_active_sponsored(&mut **tx, user_id, now)
            .await?
            .map(Into::into))
    }

    async fn insert_subscription(
        &self,
        tx: &mut Self::Tx,
        subscription: &Subscription,
    ) -> Result<(), StoreError> {
        Ok(self.subscriptions.insert(&mut **tx, subscription).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_limit_saturates() {
        assert_eq!(sql_limit(25), 25);
        assert_eq!(sql_limit(usize::MAX), i64::MAX);
    }
}
