//! Code purchases and pool statistics.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use super::sponsorship::SponsorshipService;
use super::store::{with_retry, SponsorshipStore};
use crate::error::{SponsorshipError, SponsorshipResult, StoreError};
use crate::models::purchase::PurchaseCodesRequest;
use crate::models::{
    generate_sponsorship_code, PaymentStatus, PoolStats, PurchaseUsage, SponsorshipCode,
    SponsorshipPurchase, SubscriptionTier, TierName,
};

/// Rounds of regeneration allowed for colliding code values.
const MAX_CODE_GENERATION_ROUNDS: usize = 10;

#[derive(Debug, Clone)]
pub struct PurchasedCodes {
    pub purchase: SponsorshipPurchase,
    pub tier: SubscriptionTier,
    pub codes: Vec<SponsorshipCode>,
}

impl<S: SponsorshipStore> SponsorshipService<S> {
    /// Records a completed purchase and issues its codes.
    pub async fn purchase_codes(
        &self,
        sponsor_id: Uuid,
        request: &PurchaseCodesRequest,
    ) -> SponsorshipResult<PurchasedCodes> {
        self.ensure_sponsor(sponsor_id).await?;

        let tier_name: TierName = request
            .tier
            .parse()
            .map_err(|e: crate::models::tier::UnknownTier| {
                SponsorshipError::Validation(e.to_string())
            })?;
        let tier = self
            .store()
            .find_tier_by_name(tier_name)
            .await?
            .ok_or_else(|| SponsorshipError::NotFound(format!("Tier {} not found", tier_name)))?;

        if !tier.is_active {
            return Err(SponsorshipError::Validation(format!(
                "Tier {} is not available for purchase",
                tier.name
            )));
        }
        if !tier.accepts_quantity(request.quantity) {
            return Err(SponsorshipError::Validation(format!(
                "Quantity for tier {} must be between {} and {}",
                tier.name, tier.min_purchase_quantity, tier.max_purchase_quantity
            )));
        }

        let purchased = with_retry("purchase_codes", || {
            self.try_purchase(sponsor_id, request, &tier)
        })
        .await?;

        info!(
            purchase_id = %purchased.purchase.id,
            sponsor_id = %sponsor_id,
            tier = %tier.name,
            quantity = request.quantity,
            "Codes purchased"
        );
        Ok(purchased)
    }

    async fn try_purchase(
        &self,
        sponsor_id: Uuid,
        request: &PurchaseCodesRequest,
        tier: &SubscriptionTier,
    ) -> SponsorshipResult<PurchasedCodes> {
        let now = self.now();
        let settings = self.settings();
        let prefix = request
            .code_prefix
            .clone()
            .unwrap_or_else(|| settings.code_prefix.clone());
        let validity_days = request
            .validity_days
            .map(i64::from)
            .unwrap_or(settings.code_validity_days);

        let stored_validity_days = i32::try_from(validity_days)
            .ok()
            .filter(|days| *days >= 1)
            .ok_or_else(|| {
                SponsorshipError::Validation(format!(
                    "Validity of {} days is out of range",
                    validity_days
                ))
            })?;
        let total_amount_cents = request
            .unit_price_cents
            .checked_mul(i64::from(request.quantity))
            .ok_or_else(|| {
                SponsorshipError::Validation("Purchase total is out of range".to_string())
            })?;

        let values = self
            .generate_unique_codes(&prefix, request.quantity as usize, now)
            .await?;

        let purchase = SponsorshipPurchase {
            id: Uuid::new_v4(),
            sponsor_id,
            tier_id: tier.id,
            quantity: request.quantity,
            unit_price_cents: request.unit_price_cents,
            total_amount_cents,
            currency: request.currency.to_uppercase(),
            payment_method: request.payment_method.clone(),
            payment_reference: request.payment_reference.clone(),
            payment_status: PaymentStatus::Completed,
            code_prefix: prefix,
            validity_days: stored_validity_days,
            company_name: request.company_name.clone(),
            invoice_address: request.invoice_address.clone(),
            tax_number: request.tax_number.clone(),
            notes: request.notes.clone(),
            purchased_at: now,
        };

        let expiry = now + Duration::days(validity_days);
        let codes: Vec<SponsorshipCode> = values
            .into_iter()
            .map(|value| SponsorshipCode::issue(value, sponsor_id, purchase.id, tier.id, expiry, now))
            .collect();

        let store = self.store();
        let mut tx = store.begin().await?;
        store.insert_purchase(&mut tx, &purchase).await?;
        store.insert_codes(&mut tx, &codes).await?;
        store.commit(tx).await?;

        Ok(PurchasedCodes {
            purchase,
            tier: tier.clone(),
            codes,
        })
    }

    /// Generates `count` distinct values not yet present in the store.
    /// A concurrent purchase can still take one before insert; the insert
    /// then conflicts and the whole purchase is retried.
    async fn generate_unique_codes(
        &self,
        prefix: &str,
        count: usize,
        now: DateTime<Utc>,
    ) -> SponsorshipResult<Vec<String>> {
        let mut accepted: HashSet<String> = HashSet::with_capacity(count);

        for _ in 0..MAX_CODE_GENERATION_ROUNDS {
            let mut batch = Vec::with_capacity(count - accepted.len());
            while batch.len() < count - accepted.len() {
                let value = generate_sponsorship_code(prefix, now);
                if !accepted.contains(&value) && !batch.contains(&value) {
                    batch.push(value);
                }
            }

            let taken: HashSet<String> = self
                .store()
                .existing_code_values(&batch)
                .await?
                .into_iter()
                .collect();
            accepted.extend(batch.into_iter().filter(|v| !taken.contains(v)));

            if accepted.len() == count {
                return Ok(accepted.into_iter().collect());
            }
        }

        Err(StoreError::Backend("Could not generate unique sponsorship codes".to_string()).into())
    }

    /// Derived usage counters for one of the sponsor's purchases.
    pub async fn purchase_usage(
        &self,
        sponsor_id: Uuid,
        purchase_id: Uuid,
    ) -> SponsorshipResult<PurchaseUsage> {
        let purchase = self
            .store()
            .find_purchase(purchase_id)
            .await?
            .filter(|p| p.sponsor_id == sponsor_id)
            .ok_or_else(|| SponsorshipError::NotFound("Purchase not found".to_string()))?;

        let stats = self
            .store()
            .pool_stats(sponsor_id, Some(purchase_id), self.now())
            .await?;
        Ok(PurchaseUsage {
            purchase_id,
            quantity: purchase.quantity,
            stats,
        })
    }

    /// Pool statistics across all of a sponsor's codes, or one purchase.
    pub async fn pool_stats(
        &self,
        sponsor_id: Uuid,
        purchase_id: Option<Uuid>,
    ) -> SponsorshipResult<PoolStats> {
        self.ensure_purchase_owner(sponsor_id, purchase_id).await?;
        Ok(self
            .store()
            .pool_stats(sponsor_id, purchase_id, self.now())
            .await?)
    }
}
