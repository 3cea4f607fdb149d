//! The sponsorship service: one entry point for every code allocation,
//! invitation, transfer and redemption operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::identity::IdentityProvider;
use super::messaging::MessageDispatcher;
use super::settings::SponsorshipSettings;
use super::store::SponsorshipStore;
use crate::error::{SponsorshipError, SponsorshipResult};
use crate::models::{SubscriptionTier, TierName};

/// Name used in outbound messages when the sponsor has none on file.
const FALLBACK_SPONSOR_NAME: &str = "Your sponsor";

pub struct SponsorshipService<S: SponsorshipStore> {
    store: S,
    messenger: Arc<dyn MessageDispatcher>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    settings: SponsorshipSettings,
}

impl<S: SponsorshipStore> SponsorshipService<S> {
    pub fn new(
        store: S,
        messenger: Arc<dyn MessageDispatcher>,
        identity: Arc<dyn IdentityProvider>,
        settings: SponsorshipSettings,
    ) -> Self {
        Self {
            store,
            messenger,
            identity,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &SponsorshipSettings {
        &self.settings
    }

    pub(crate) fn messenger(&self) -> &dyn MessageDispatcher {
        self.messenger.as_ref()
    }

    pub(crate) fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fails with `Forbidden` unless `user_id` holds the Sponsor role.
    pub(crate) async fn ensure_sponsor(&self, user_id: Uuid) -> SponsorshipResult<()> {
        if self.identity.has_sponsor_role(user_id).await? {
            Ok(())
        } else {
            Err(SponsorshipError::Forbidden(
                "Sponsor role required".to_string(),
            ))
        }
    }

    /// Resolves an optional tier name to its tier row.
    pub(crate) async fn resolve_tier(
        &self,
        name: Option<&str>,
    ) -> SponsorshipResult<Option<SubscriptionTier>> {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };

        let tier_name: TierName = name
            .parse()
            .map_err(|e: crate::models::tier::UnknownTier| {
                SponsorshipError::Validation(e.to_string())
            })?;

        self.store
            .find_tier_by_name(tier_name)
            .await?
            .map(Some)
            .ok_or_else(|| SponsorshipError::NotFound(format!("Tier {} not found", tier_name)))
    }

    /// Purchase ownership check for operations that draw from one purchase.
    pub(crate) async fn ensure_purchase_owner(
        &self,
        sponsor_id: Uuid,
        purchase_id: Option<Uuid>,
    ) -> SponsorshipResult<()> {
        let Some(purchase_id) = purchase_id else {
            return Ok(());
        };

        match self.store.find_purchase(purchase_id).await? {
            Some(purchase) if purchase.sponsor_id == sponsor_id => Ok(()),
            _ => Err(SponsorshipError::NotFound("Purchase not found".to_string())),
        }
    }

    pub(crate) async fn sponsor_name(&self, sponsor_id: Uuid) -> String {
        match self.identity.display_name(sponsor_id).await {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => FALLBACK_SPONSOR_NAME.to_string(),
            Err(e) => {
                warn!(sponsor_id = %sponsor_id, error = %e, "Failed to load sponsor name");
                FALLBACK_SPONSOR_NAME.to_string()
            }
        }
    }
}
