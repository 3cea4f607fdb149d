//! Redemption: the only path that marks a code used.

use chrono::Duration;
use tracing::info;
use uuid::Uuid;

use super::sponsorship::SponsorshipService;
use super::store::{with_retry, SponsorshipStore};
use crate::error::{SponsorshipError, SponsorshipResult, StoreError};
use crate::models::subscription::SPONSORSHIP_PAYMENT_METHOD;
use crate::models::{
    CodeValidity, SponsorshipCode, Subscription, SubscriptionStatus, SubscriptionTier,
};

#[derive(Debug, Clone)]
pub struct Redemption {
    pub subscription: Subscription,
    pub tier: SubscriptionTier,
    /// Whether the subscription waits behind an active one.
    pub queued: bool,
}

/// Codes are matched upper-case with surrounding whitespace removed.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl<S: SponsorshipStore> SponsorshipService<S> {
    /// Checks a code without changing it.
    pub async fn validate_code(
        &self,
        code: &str,
    ) -> SponsorshipResult<(CodeValidity, Option<SponsorshipCode>)> {
        let found = self.store().find_code_by_value(&normalize_code(code)).await?;
        Ok(match found {
            Some(code) => (code.validity(self.now()), Some(code)),
            None => (CodeValidity::NotFound, None),
        })
    }

    /// Consumes a code and creates the subscription it pays for.
    pub async fn redeem(&self, code: &str, user_id: Uuid) -> SponsorshipResult<Redemption> {
        let value = normalize_code(code);

        // Tier is immutable per code, so it is resolved ahead of the transaction.
        let tier_id = self
            .store()
            .find_code_by_value(&value)
            .await?
            .map(|c| c.tier_id)
            .ok_or(SponsorshipError::CodeUnavailable(CodeValidity::NotFound))?;
        let tier = self.store().find_tier(tier_id).await?.ok_or_else(|| {
            StoreError::Backend(format!("Tier {} referenced by code is missing", tier_id))
        })?;

        let redemption =
            with_retry("redeem_code", || self.try_redeem(&value, user_id, &tier)).await?;

        info!(
            user_id = %user_id,
            subscription_id = %redemption.subscription.id,
            tier = %tier.name,
            queued = redemption.queued,
            "Code redeemed"
        );
        Ok(redemption)
    }

    async fn try_redeem(
        &self,
        value: &str,
        user_id: Uuid,
        tier: &SubscriptionTier,
    ) -> SponsorshipResult<Redemption> {
        let now = self.now();
        let store = self.store();
        let mut tx = store.begin().await?;

        let mut code = store
            .lock_code_by_value(&mut tx, value)
            .await?
            .ok_or(SponsorshipError::CodeUnavailable(CodeValidity::NotFound))?;
        match code.validity(now) {
            CodeValidity::Valid => {}
            other => return Err(SponsorshipError::CodeUnavailable(other)),
        }

        let active = store
            .find_active_sponsored_subscription(&mut tx, user_id, now)
            .await?;
        let queued = active.is_some();

        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id,
            tier_id: tier.id,
            status: if queued {
                SubscriptionStatus::Pending
            } else {
                SubscriptionStatus::Active
            },
            is_sponsored: true,
            sponsor_id: Some(code.sponsor_id),
            sponsorship_code_id: Some(code.id),
            payment_method: SPONSORSHIP_PAYMENT_METHOD.to_string(),
            payment_reference: Some(code.code.clone()),
            start_date: if queued { None } else { Some(now) },
            end_date: if queued {
                None
            } else {
                Some(now + Duration::days(i64::from(tier.subscription_days)))
            },
            previous_subscription_id: active.map(|s| s.id),
            created_at: now,
        };

        let expected = code.hold;
        code.redeem(user_id, subscription.id, now);
        store.swap_code(&mut tx, &expected, &code).await?;
        store.insert_subscription(&mut tx, &subscription).await?;
        store.commit(tx).await?;

        Ok(Redemption {
            subscription,
            tier: tier.clone(),
            queued,
        })
    }

    /// Deactivates one of the sponsor's unused codes.
    pub async fn deactivate_code(
        &self,
        code: &str,
        sponsor_id: Uuid,
    ) -> SponsorshipResult<SponsorshipCode> {
        let value = normalize_code(code);
        let code = with_retry("deactivate_code", || self.try_deactivate(&value, sponsor_id)).await?;
        info!(code_id = %code.id, sponsor_id = %sponsor_id, "Code deactivated");
        Ok(code)
    }

    async fn try_deactivate(
        &self,
        value: &str,
        sponsor_id: Uuid,
    ) -> SponsorshipResult<SponsorshipCode> {
        let store = self.store();
        let mut tx = store.begin().await?;

        let mut code = store
            .lock_code_by_value(&mut tx, value)
            .await?
            .ok_or_else(|| SponsorshipError::NotFound("Code not found".to_string()))?;
        if code.sponsor_id != sponsor_id {
            return Err(SponsorshipError::Forbidden(
                "Code belongs to another sponsor".to_string(),
            ));
        }
        if code.is_used {
            return Err(SponsorshipError::CodeUnavailable(CodeValidity::AlreadyUsed));
        }

        let expected = code.hold;
        code.is_active = false;
        store.swap_code(&mut tx, &expected, &code).await?;
        store.commit(tx).await?;
        Ok(code)
    }
}
