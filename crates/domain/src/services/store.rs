//! Storage seam for the code pool, invitations, purchases and subscriptions.
//!
//! Every mutation happens inside a transaction obtained from
//! [`SponsorshipStore::begin`]. Dropping a transaction without calling
//! [`SponsorshipStore::commit`] rolls it back. Methods prefixed `lock_`
//! take row locks (or the equivalent) that are held until the
//! transaction ends. The candidate scans, `lock_available_codes` and
//! `lock_overdue_invitations`, skip rows already locked by another
//! transaction; the other `lock_` methods wait for them.
//!
//! Pool-level reads (`find_*`, `list_*`, `pool_stats`) must not be called
//! while the caller holds a transaction from the same store.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::{SponsorshipError, SponsorshipResult, StoreError};
use crate::models::{
    Hold, Invitation, InvitationKind, InvitationStatus, PoolStats, SponsorshipCode,
    SponsorshipPurchase, Subscription, SubscriptionTier, TierName,
};
use crate::services::allocation::{CodeFilter, CodeOrder};
use shared::pagination::Cursor;

/// Attempts made for one operation before a conflict is surfaced.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// Filter for listing a sponsor's invitations, newest first.
#[derive(Debug, Clone)]
pub struct InvitationQuery {
    pub sponsor_id: Uuid,
    pub kind: InvitationKind,
    /// Matched against the effective status at `now`.
    pub status: Option<InvitationStatus>,
    pub after: Option<Cursor>,
    pub limit: i64,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait SponsorshipStore: Send + Sync + 'static {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Tiers
    // ------------------------------------------------------------------

    async fn find_tier_by_name(&self, name: TierName)
        -> Result<Option<SubscriptionTier>, StoreError>;

    async fn find_tier(&self, id: Uuid) -> Result<Option<SubscriptionTier>, StoreError>;

    // ------------------------------------------------------------------
    // Codes
    // ------------------------------------------------------------------

    /// Available codes matching `filter` in `order`, at most `limit`.
    async fn find_available_codes(
        &self,
        filter: &CodeFilter,
        order: CodeOrder,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError>;

    async fn find_code_by_value(&self, code: &str) -> Result<Option<SponsorshipCode>, StoreError>;

    /// Returns the subset of `values` already used by some code.
    async fn existing_code_values(&self, values: &[String]) -> Result<Vec<String>, StoreError>;

    async fn pool_stats(
        &self,
        sponsor_id: Uuid,
        purchase_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<PoolStats, StoreError>;

    /// Locks available codes matching `filter`, in `order`, at most `limit`.
    async fn lock_available_codes(
        &self,
        tx: &mut Self::Tx,
        filter: &CodeFilter,
        order: CodeOrder,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError>;

    /// Locks every code reserved for `invitation_id`, whatever its validity.
    async fn lock_codes_reserved_for(
        &self,
        tx: &mut Self::Tx,
        invitation_id: Uuid,
    ) -> Result<Vec<SponsorshipCode>, StoreError>;

    /// Locks the sponsor's codes held by `dealer_id` that are unused,
    /// active and unexpired.
    async fn lock_reclaimable_codes(
        &self,
        tx: &mut Self::Tx,
        sponsor_id: Uuid,
        dealer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError>;

    async fn lock_code_by_value(
        &self,
        tx: &mut Self::Tx,
        code: &str,
    ) -> Result<Option<SponsorshipCode>, StoreError>;

    /// Writes `code` if the stored row is still unused and still carries
    /// `expected`. Otherwise fails with [`StoreError::Conflict`].
    async fn swap_code(
        &self,
        tx: &mut Self::Tx,
        expected: &Hold,
        code: &SponsorshipCode,
    ) -> Result<(), StoreError>;

    async fn insert_codes(
        &self,
        tx: &mut Self::Tx,
        codes: &[SponsorshipCode],
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Invitations
    // ------------------------------------------------------------------

    async fn insert_invitation(
        &self,
        tx: &mut Self::Tx,
        invitation: &Invitation,
    ) -> Result<(), StoreError>;

    async fn update_invitation(
        &self,
        tx: &mut Self::Tx,
        invitation: &Invitation,
    ) -> Result<(), StoreError>;

    async fn lock_invitation(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
    ) -> Result<Option<Invitation>, StoreError>;

    async fn lock_invitation_by_token(
        &self,
        tx: &mut Self::Tx,
        kind: InvitationKind,
        token: &str,
    ) -> Result<Option<Invitation>, StoreError>;

    /// Locks pending invitations whose expiry is before `now`, oldest expiry first.
    async fn lock_overdue_invitations(
        &self,
        tx: &mut Self::Tx,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Invitation>, StoreError>;

    /// Locks accepted dealer invitations from `sponsor_id` taken by `dealer_id`.
    async fn lock_accepted_dealer_invitations(
        &self,
        tx: &mut Self::Tx,
        sponsor_id: Uuid,
        dealer_id: Uuid,
    ) -> Result<Vec<Invitation>, StoreError>;

    async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, StoreError>;

    async fn list_invitations(&self, query: &InvitationQuery)
        -> Result<Vec<Invitation>, StoreError>;

    // ------------------------------------------------------------------
    // Purchases and subscriptions
    // ------------------------------------------------------------------

    async fn insert_purchase(
        &self,
        tx: &mut Self::Tx,
        purchase: &SponsorshipPurchase,
    ) -> Result<(), StoreError>;

    async fn find_purchase(&self, id: Uuid) -> Result<Option<SponsorshipPurchase>, StoreError>;

    async fn find_active_sponsored_subscription(
        &self,
        tx: &mut Self::Tx,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, StoreError>;

    async fn insert_subscription(
        &self,
        tx: &mut Self::Tx,
        subscription: &Subscription,
    ) -> Result<(), StoreError>;
}

/// Runs `attempt` again when it fails with a storage conflict.
pub async fn with_retry<T, F, Fut>(operation: &'static str, mut attempt: F) -> SponsorshipResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SponsorshipResult<T>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Err(SponsorshipError::Storage(StoreError::Conflict(reason)))
                if attempts < MAX_TRANSACTION_ATTEMPTS =>
            {
                warn!(operation, attempts, reason = %reason, "Transaction conflict, retrying");
            }
            other => return other,
        }
    }
}
