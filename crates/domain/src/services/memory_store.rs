//! In-memory [`SponsorshipStore`] used by tests and local tooling.
//!
//! A transaction holds the store's single lock and mutates a private copy
//! of the state; commit publishes the copy. Transactions are therefore
//! fully serialized, which trivially satisfies the locking contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::allocation::{select_codes, CodeFilter, CodeOrder};
use super::store::{InvitationQuery, SponsorshipStore};
use crate::error::StoreError;
use crate::models::{
    Hold, Invitation, InvitationKind, InvitationStatus, PoolStats, SponsorshipCode,
    SponsorshipPurchase, Subscription, SubscriptionTier, TierName,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub tiers: Vec<SubscriptionTier>,
    pub codes: HashMap<Uuid, SponsorshipCode>,
    pub invitations: HashMap<Uuid, Invitation>,
    pub purchases: HashMap<Uuid, SponsorshipPurchase>,
    pub subscriptions: Vec<Subscription>,
}

impl MemoryState {
    fn sponsor_codes(&self, sponsor_id: Uuid) -> impl Iterator<Item = &SponsorshipCode> + '_ {
        self.codes.values().filter(move |c| c.sponsor_id == sponsor_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with tiers S, M, L and XL.
    pub fn with_default_tiers() -> Self {
        let tiers = [
            (TierName::S, "Small", 1, 50),
            (TierName::M, "Medium", 1, 200),
            (TierName::L, "Large", 1, 1000),
            (TierName::XL, "Extra Large", 1, 10000),
        ]
        .into_iter()
        .map(|(name, display, min, max)| SubscriptionTier {
            id: Uuid::new_v4(),
            name,
            display_name: display.to_string(),
            min_purchase_quantity: min,
            max_purchase_quantity: max,
            subscription_days: 30,
            is_active: true,
        })
        .collect();

        Self {
            state: Arc::new(Mutex::new(MemoryState {
                tiers,
                ..Default::default()
            })),
        }
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn tier_id(&self, name: TierName) -> Option<Uuid> {
        self.state
            .lock()
            .await
            .tiers
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
    }
}

fn matches_status(invitation: &Invitation, status: InvitationStatus, now: DateTime<Utc>) -> bool {
    invitation.effective_status(now) == status
}

fn conflict(what: &str, id: Uuid) -> StoreError {
    StoreError::Conflict(format!("{} {} changed concurrently", what, id))
}

#[async_trait]
impl SponsorshipStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = tx;
        *guard = working;
        Ok(())
    }

    async fn find_tier_by_name(
        &self,
        name: TierName,
    ) -> Result<Option<SubscriptionTier>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tiers.iter().find(|t| t.name == name).cloned())
    }

    async fn find_tier(&self, id: Uuid) -> Result<Option<SubscriptionTier>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tiers.iter().find(|t| t.id == id).cloned())
    }

    async fn find_available_codes(
        &self,
        filter: &CodeFilter,
        order: CodeOrder,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError> {
        let state = self.state.lock().await;
        Ok(select_codes(state.codes.values(), filter, order, limit, now))
    }

    async fn find_code_by_value(&self, code: &str) -> Result<Option<SponsorshipCode>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.codes.values().find(|c| c.code == code).cloned())
    }

    async fn existing_code_values(&self, values: &[String]) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(values
            .iter()
            .filter(|v| state.codes.values().any(|c| &c.code == *v))
            .cloned()
            .collect())
    }

    async fn pool_stats(
        &self,
        sponsor_id: Uuid,
        purchase_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<PoolStats, StoreError> {
        let state = self.state.lock().await;
        Ok(PoolStats::from_codes(
            state
                .sponsor_codes(sponsor_id)
                .filter(|c| purchase_id.map_or(true, |p| c.purchase_id == p)),
            now,
        ))
    }

    async fn lock_available_codes(
        &self,
        tx: &mut MemoryTx,
        filter: &CodeFilter,
        order: CodeOrder,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError> {
        Ok(select_codes(
            tx.working.codes.values(),
            filter,
            order,
            limit,
            now,
        ))
    }

    async fn lock_codes_reserved_for(
        &self,
        tx: &mut MemoryTx,
        invitation_id: Uuid,
    ) -> Result<Vec<SponsorshipCode>, StoreError> {
        let mut codes: Vec<SponsorshipCode> = tx
            .working
            .codes
            .values()
            .filter(|c| c.hold.reserved_for() == Some(invitation_id))
            .cloned()
            .collect();
        codes.sort_by(|a, b| CodeOrder::ExpirySoonest.compare(a, b));
        Ok(codes)
    }

    async fn lock_reclaimable_codes(
        &self,
        tx: &mut MemoryTx,
        sponsor_id: Uuid,
        dealer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCode>, StoreError> {
        let mut codes: Vec<SponsorshipCode> = tx
            .working
            .sponsor_codes(sponsor_id)
            .filter(|c| c.hold.dealer() == Some(dealer_id) && c.is_valid(now))
            .cloned()
            .collect();
        codes.sort_by(|a, b| CodeOrder::OldestCreated.compare(a, b));
        Ok(codes)
    }

    async fn lock_code_by_value(
        &self,
        tx: &mut MemoryTx,
        code: &str,
    ) -> Result<Option<SponsorshipCode>, StoreError> {
        Ok(tx.working.codes.values().find(|c| c.code == code).cloned())
    }

    async fn swap_code(
        &self,
        tx: &mut MemoryTx,
        expected: &Hold,
        code: &SponsorshipCode,
    ) -> Result<(), StoreError> {
        let stored = tx
            .working
            .codes
            .get_mut(&code.id)
            .ok_or_else(|| conflict("Code", code.id))?;

        if stored.is_used || stored.hold != *expected {
            return Err(conflict("Code", code.id));
        }
        *stored = code.clone();
        Ok(())
    }

    async fn insert_codes(
        &self,
        tx: &mut MemoryTx,
        codes: &[SponsorshipCode],
    ) -> Result<(), StoreError> {
        for code in codes {
            if tx.working.codes.values().any(|c| c.code == code.code) {
                return Err(StoreError::Conflict(format!(
                    "Code value {} already exists",
                    code.code
                )));
            }
            tx.working.codes.insert(code.id, code.clone());
        }
        Ok(())
    }

    async fn insert_invitation(
        &self,
        tx: &mut MemoryTx,
        invitation: &Invitation,
    ) -> Result<(), StoreError> {
        if tx
            .working
            .invitations
            .values()
            .any(|i| i.token == invitation.token)
        {
            return Err(StoreError::Conflict("Invitation token collision".to_string()));
        }
        tx.working
            .invitations
            .insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn update_invitation(
        &self,
        tx: &mut MemoryTx,
        invitation: &Invitation,
    ) -> Result<(), StoreError> {
        match tx.working.invitations.get_mut(&invitation.id) {
            Some(stored) => {
                *stored = invitation.clone();
                Ok(())
            }
            None => Err(conflict("Invitation", invitation.id)),
        }
    }

    async fn lock_invitation(
        &self,
        tx: &mut MemoryTx,
        id: Uuid,
    ) -> Result<Option<Invitation>, StoreError> {
        Ok(tx.working.invitations.get(&id).cloned())
    }

    async fn lock_invitation_by_token(
        &self,
        tx: &mut MemoryTx,
        kind: InvitationKind,
        token: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        Ok(tx
            .working
            .invitations
            .values()
            .find(|i| i.kind == kind && i.token == token)
            .cloned())
    }

    async fn lock_overdue_invitations(
        &self,
        tx: &mut MemoryTx,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Invitation>, StoreError> {
        let mut overdue: Vec<Invitation> = tx
            .working
            .invitations
            .values()
            .filter(|i| i.is_pending() && i.is_expired(now))
            .cloned()
            .collect();
        overdue.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.id.cmp(&b.id)));
        overdue.truncate(limit);
        Ok(overdue)
    }

    async fn lock_accepted_dealer_invitations(
        &self,
        tx: &mut MemoryTx,
        sponsor_id: Uuid,
        dealer_id: Uuid,
    ) -> Result<Vec<Invitation>, StoreError> {
        Ok(tx
            .working
            .invitations
            .values()
            .filter(|i| {
                i.kind == InvitationKind::Dealer
                    && i.sponsor_id == sponsor_id
                    && i.status == InvitationStatus::Accepted
                    && i.accepted_by_user_id == Some(dealer_id)
            })
            .cloned()
            .collect())
    }

    async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.invitations.get(&id).cloned())
    }

    async fn list_invitations(
        &self,
        query: &InvitationQuery,
    ) -> Result<Vec<Invitation>, StoreError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Invitation> = state
            .invitations
            .values()
            .filter(|i| i.sponsor_id == query.sponsor_id && i.kind == query.kind)
            .filter(|i| query.status.map_or(true, |s| matches_status(i, s, query.now)))
            .filter(|i| {
                query.after.map_or(true, |c| {
                    (i.created_at, i.id) < (c.created_at, c.id)
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(query.limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_purchase(
        &self,
        tx: &mut MemoryTx,
        purchase: &SponsorshipPurchase,
    ) -> Result<(), StoreError> {
        tx.working.purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn find_purchase(&self, id: Uuid) -> Result<Option<SponsorshipPurchase>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.purchases.get(&id).cloned())
    }

    async fn find_active_sponsored_subscription(
        &self,
        tx: &mut MemoryTx,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(tx
            .working
            .subscriptions
            .iter()
            .find(|s| s.user_id == user_id && s.is_sponsored && s.is_active_at(now))
            .cloned())
    }

    async fn insert_subscription(
        &self,
        tx: &mut MemoryTx,
        subscription: &Subscription,
    ) -> Result<(), StoreError> {
        tx.working.subscriptions.push(subscription.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    async fn seed(store: &MemoryStore, sponsor: Uuid, count: usize) -> Vec<SponsorshipCode> {
        let tier = store.tier_id(TierName::M).await.unwrap();
        let purchase = Uuid::new_v4();
        let codes: Vec<SponsorshipCode> = (0..count)
            .map(|i| {
                SponsorshipCode::issue(
                    format!("AGRI-2026-{:04}AAAA", 1000 + i),
                    sponsor,
                    purchase,
                    tier,
                    now() + Duration::days(365),
                    now() + Duration::seconds(i as i64),
                )
            })
            .collect();
        let mut tx = store.begin().await.unwrap();
        store.insert_codes(&mut tx, &codes).await.unwrap();
        store.commit(tx).await.unwrap();
        codes
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::with_default_tiers();
        let sponsor = Uuid::new_v4();
        let codes = seed(&store, sponsor, 2).await;

        {
            let mut tx = store.begin().await.unwrap();
            let mut code = codes[0].clone();
            code.reserve(InvitationKind::Farmer, Uuid::new_v4(), now());
            store.swap_code(&mut tx, &Hold::None, &code).await.unwrap();
        }

        let stats = store.pool_stats(sponsor, None, now()).await.unwrap();
        assert_eq!(stats.available, 2);
        assert_eq!(stats.reserved, 0);
    }

    #[tokio::test]
    async fn test_swap_rejects_stale_expectation() {
        let store = MemoryStore::with_default_tiers();
        let sponsor = Uuid::new_v4();
        let codes = seed(&store, sponsor, 1).await;

        let mut tx = store.begin().await.unwrap();
        let mut first = codes[0].clone();
        first.reserve(InvitationKind::Farmer, Uuid::new_v4(), now());
        store.swap_code(&mut tx, &Hold::None, &first).await.unwrap();

        let mut second = codes[0].clone();
        second.reserve(InvitationKind::Dealer, Uuid::new_v4(), now());
        let err = store.swap_code(&mut tx, &Hold::None, &second).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_duplicate_code_value_conflicts() {
        let store = MemoryStore::with_default_tiers();
        let sponsor = Uuid::new_v4();
        let codes = seed(&store, sponsor, 1).await;

        let mut duplicate = codes[0].clone();
        duplicate.id = Uuid::new_v4();
        let mut tx = store.begin().await.unwrap();
        let err = store.insert_codes(&mut tx, &[duplicate]).await.unwrap_err();
        assert!(err.is_conflict());
        drop(tx);

        let existing = store
            .existing_code_values(&[codes[0].code.clone(), "AGRI-2026-9999FFFF".to_string()])
            .await
            .unwrap();
        assert_eq!(existing, vec![codes[0].code.clone()]);
    }
}
