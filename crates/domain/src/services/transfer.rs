//! Direct movement of codes between a sponsor and a dealer, outside of
//! invitations.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::allocation::{CodeFilter, CodeOrder};
use super::sponsorship::SponsorshipService;
use super::store::{with_retry, SponsorshipStore};
use crate::error::{SponsorshipError, SponsorshipResult};
use crate::models::{ReclaimCodesRequest, SubscriptionTier, TransferCodesRequest};

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub code_ids: Vec<Uuid>,
    pub transferred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReclaimOutcome {
    pub code_ids: Vec<Uuid>,
    pub invitations_reclaimed: usize,
    pub reclaimed_at: DateTime<Utc>,
}

impl<S: SponsorshipStore> SponsorshipService<S> {
    /// Assigns the sponsor's oldest available codes straight to a dealer.
    pub async fn transfer_codes(
        &self,
        sponsor_id: Uuid,
        dealer_id: Uuid,
        request: &TransferCodesRequest,
    ) -> SponsorshipResult<TransferOutcome> {
        self.ensure_sponsor(sponsor_id).await?;

        if request.code_count < 1 {
            return Err(SponsorshipError::Validation(
                "code_count must be at least 1".to_string(),
            ));
        }
        if dealer_id == sponsor_id {
            return Err(SponsorshipError::Validation(
                "Cannot transfer codes to yourself".to_string(),
            ));
        }
        if !self.identity().user_exists(dealer_id).await? {
            return Err(SponsorshipError::NotFound("Dealer not found".to_string()));
        }
        if !self.identity().has_sponsor_role(dealer_id).await? {
            return Err(SponsorshipError::Validation(
                "Dealer must hold the Sponsor role".to_string(),
            ));
        }

        self.ensure_purchase_owner(sponsor_id, request.purchase_id)
            .await?;
        let tier = self.resolve_tier(request.package_tier.as_deref()).await?;

        let outcome = with_retry("transfer_codes", || {
            self.try_transfer(sponsor_id, dealer_id, request, tier.as_ref())
        })
        .await?;

        info!(
            sponsor_id = %sponsor_id,
            dealer_id = %dealer_id,
            codes = outcome.code_ids.len(),
            "Codes transferred to dealer"
        );
        Ok(outcome)
    }

    async fn try_transfer(
        &self,
        sponsor_id: Uuid,
        dealer_id: Uuid,
        request: &TransferCodesRequest,
        tier: Option<&SubscriptionTier>,
    ) -> SponsorshipResult<TransferOutcome> {
        let now = self.now();
        let count = request.code_count as usize;
        let filter = CodeFilter::sponsor(sponsor_id)
            .with_tier(tier.map(|t| t.id))
            .with_purchase(request.purchase_id);

        let store = self.store();
        let mut tx = store.begin().await?;
        let codes = store
            .lock_available_codes(&mut tx, &filter, CodeOrder::OldestCreated, count, now)
            .await?;
        if codes.len() < count {
            return Err(SponsorshipError::insufficient(count, codes.len()));
        }

        let mut code_ids = Vec::with_capacity(count);
        for mut code in codes {
            let expected = code.hold;
            code.assign_to_dealer(dealer_id, sponsor_id, now);
            store.swap_code(&mut tx, &expected, &code).await?;
            code_ids.push(code.id);
        }

        store.commit(tx).await?;
        Ok(TransferOutcome {
            code_ids,
            transferred_at: now,
        })
    }

    /// Pulls every unused, active, unexpired code the dealer holds back into
    /// the sponsor's pool. Accepted invitations linking the pair are marked
    /// reclaimed in the same transaction.
    pub async fn reclaim_codes(
        &self,
        sponsor_id: Uuid,
        dealer_id: Uuid,
        request: &ReclaimCodesRequest,
    ) -> SponsorshipResult<ReclaimOutcome> {
        self.ensure_sponsor(sponsor_id).await?;

        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());

        let outcome = with_retry("reclaim_codes", || {
            self.try_reclaim(sponsor_id, dealer_id, reason)
        })
        .await?;

        info!(
            sponsor_id = %sponsor_id,
            dealer_id = %dealer_id,
            codes = outcome.code_ids.len(),
            invitations = outcome.invitations_reclaimed,
            "Codes reclaimed from dealer"
        );
        Ok(outcome)
    }

    async fn try_reclaim(
        &self,
        sponsor_id: Uuid,
        dealer_id: Uuid,
        reason: Option<&str>,
    ) -> SponsorshipResult<ReclaimOutcome> {
        let now = self.now();
        let store = self.store();
        let mut tx = store.begin().await?;

        let codes = store
            .lock_reclaimable_codes(&mut tx, sponsor_id, dealer_id, now)
            .await?;
        if codes.is_empty() {
            return Err(SponsorshipError::NotFound(
                "No codes available to reclaim".to_string(),
            ));
        }

        let mut code_ids = Vec::with_capacity(codes.len());
        for mut code in codes {
            let expected = code.hold;
            code.reclaim(sponsor_id, now);
            store.swap_code(&mut tx, &expected, &code).await?;
            code_ids.push(code.id);
        }

        let note = match reason {
            Some(reason) => format!(
                "{} codes reclaimed on {}: {}",
                code_ids.len(),
                now.format("%Y-%m-%d"),
                reason
            ),
            None => format!(
                "{} codes reclaimed on {}",
                code_ids.len(),
                now.format("%Y-%m-%d")
            ),
        };

        let invitations = store
            .lock_accepted_dealer_invitations(&mut tx, sponsor_id, dealer_id)
            .await?;
        let invitations_reclaimed = invitations.len();
        for mut invitation in invitations {
            invitation.mark_reclaimed(&note);
            store.update_invitation(&mut tx, &invitation).await?;
        }

        store.commit(tx).await?;
        Ok(ReclaimOutcome {
            code_ids,
            invitations_reclaimed,
            reclaimed_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CodeState, Hold, InvitationKind, InvitationStatus};
    use crate::services::test_support::{dealer_invitation, Fixture};
    use chrono::Duration;

    fn transfer(count: i32) -> TransferCodesRequest {
        TransferCodesRequest {
            purchase_id: None,
            code_count: count,
            package_tier: None,
        }
    }

    #[tokio::test]
    async fn test_reclaim_returns_unused_dealer_codes() {
        let fx = Fixture::new().await;
        fx.purchase("L", 5).await;

        let created = fx
            .service
            .create_invitation(
                fx.sponsor_id,
                dealer_invitation("dealer@example.com", 5, None),
            )
            .await
            .unwrap();
        let dealer = fx.dealer("dealer@example.com").await;
        let accepted = fx
            .service
            .accept_invitation(InvitationKind::Dealer, &created.invitation.token, &dealer)
            .await
            .unwrap();

        for code in accepted.codes.iter().take(2) {
            fx.service.redeem(&code.code, uuid::Uuid::new_v4()).await.unwrap();
        }

        let outcome = fx
            .service
            .reclaim_codes(
                fx.sponsor_id,
                dealer.user_id,
                &ReclaimCodesRequest {
                    reason: Some(" Contract ended ".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.code_ids.len(), 3);
        assert_eq!(outcome.invitations_reclaimed, 1);

        let stats = fx.stats().await;
        assert_eq!(stats.available, 3);
        assert_eq!(stats.used, 2);
        assert_eq!(stats.assigned, 0);

        for id in &outcome.code_ids {
            let code = fx.code(*id).await;
            assert_eq!(code.hold, Hold::None);
            assert_eq!(code.reclaimed_by_user_id, Some(fx.sponsor_id));
        }

        let invitation = fx
            .store
            .find_invitation(created.invitation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invitation.status, InvitationStatus::Reclaimed);
        assert_eq!(
            invitation.notes.as_deref(),
            Some("3 codes reclaimed on 2026-03-01: Contract ended")
        );
    }

    #[tokio::test]
    async fn test_reclaim_with_nothing_held() {
        let fx = Fixture::new().await;
        fx.purchase("M", 2).await;
        let dealer = fx.identity.add_sponsor("Empty Dealer").await;

        let err = fx
            .service
            .reclaim_codes(fx.sponsor_id, dealer, &ReclaimCodesRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SponsorshipError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reclaim_skips_expired_codes() {
        let fx = Fixture::new().await;
        fx.purchase("M", 2).await;
        let dealer = fx.identity.add_sponsor("North Dealer").await;
        fx.service
            .transfer_codes(fx.sponsor_id, dealer, &transfer(2))
            .await
            .unwrap();

        fx.clock.advance(Duration::days(400));
        let err = fx
            .service
            .reclaim_codes(fx.sponsor_id, dealer, &ReclaimCodesRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SponsorshipError::NotFound(_)));
        assert_eq!(fx.stats().await.expired, 2);
    }

    #[tokio::test]
    async fn test_transfer_takes_oldest_codes_first() {
        let fx = Fixture::new().await;
        let first = fx.purchase("M", 3).await;
        fx.clock.advance(Duration::days(1));
        let second = fx.purchase("M", 3).await;
        let dealer = fx.identity.add_sponsor("North Dealer").await;

        let outcome = fx
            .service
            .transfer_codes(fx.sponsor_id, dealer, &transfer(4))
            .await
            .unwrap();
        assert_eq!(outcome.code_ids.len(), 4);

        for code in &first.codes {
            assert_eq!(fx.code(code.id).await.hold.dealer(), Some(dealer));
        }
        let from_second = second
            .codes
            .iter()
            .filter(|c| outcome.code_ids.contains(&c.id))
            .count();
        assert_eq!(from_second, 1);

        let stats = fx.stats().await;
        assert_eq!(stats.assigned, 4);
        assert_eq!(stats.available, 2);
    }

    #[tokio::test]
    async fn test_transfer_rejects_invalid_dealers() {
        let fx = Fixture::new().await;
        fx.purchase("M", 3).await;
        let plain_user = fx.identity.add_user(Some("user@example.com"), None).await;

        let err = fx
            .service
            .transfer_codes(fx.sponsor_id, plain_user, &transfer(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SponsorshipError::Validation(_)));

        let err = fx
            .service
            .transfer_codes(fx.sponsor_id, uuid::Uuid::new_v4(), &transfer(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SponsorshipError::NotFound(_)));

        let err = fx
            .service
            .transfer_codes(fx.sponsor_id, fx.sponsor_id, &transfer(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SponsorshipError::Validation(_)));

        assert_eq!(fx.stats().await.available, 3);
    }

    #[tokio::test]
    async fn test_transfer_shortfall_changes_nothing() {
        let fx = Fixture::new().await;
        fx.purchase("M", 2).await;
        let dealer = fx.identity.add_sponsor("North Dealer").await;
        let before = fx.store.snapshot().await;

        let err = fx
            .service
            .transfer_codes(fx.sponsor_id, dealer, &transfer(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SponsorshipError::InsufficientInventory {
                requested: 3,
                available: 2
            }
        ));
        assert_eq!(before.codes, fx.store.snapshot().await.codes);
    }

    #[tokio::test]
    async fn test_transfer_never_moves_reserved_codes() {
        let fx = Fixture::new().await;
        fx.purchase("M", 3).await;
        let created = fx
            .service
            .create_invitation(
                fx.sponsor_id,
                crate::services::test_support::farmer_invitation(2, None),
            )
            .await
            .unwrap();
        let dealer = fx.identity.add_sponsor("North Dealer").await;

        let outcome = fx
            .service
            .transfer_codes(fx.sponsor_id, dealer, &transfer(1))
            .await
            .unwrap();
        assert!(!created.code_ids.contains(&outcome.code_ids[0]));

        for id in &created.code_ids {
            assert_eq!(fx.code(*id).await.state(fx.clock_now()), CodeState::Reserved);
        }
    }

    #[tokio::test]
    async fn test_transfer_scoped_to_foreign_purchase_is_not_found() {
        let fx = Fixture::new().await;
        fx.purchase("M", 2).await;
        let other = fx.identity.add_sponsor("Other Sponsor").await;
        let foreign = fx.purchase_for(other, "M", 2).await;
        let dealer = fx.identity.add_sponsor("North Dealer").await;

        let request = TransferCodesRequest {
            purchase_id: Some(foreign.purchase.id),
            code_count: 1,
            package_tier: None,
        };
        let err = fx
            .service
            .transfer_codes(fx.sponsor_id, dealer, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, SponsorshipError::NotFound(_)));
    }
}
