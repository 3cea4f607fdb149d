//! Shared fixtures for service tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use super::clock::ManualClock;
use super::identity::MockIdentityProvider;
use super::memory_store::MemoryStore;
use super::messaging::MockMessageDispatcher;
use super::purchase::PurchasedCodes;
use super::settings::SponsorshipSettings;
use super::sponsorship::SponsorshipService;
use super::store::SponsorshipStore;
use crate::models::purchase::PurchaseCodesRequest;
use crate::models::{
    Caller, DeliveryChannel, InvitationKind, InvitationType, NewInvitation, PoolStats, Recipient,
    SponsorshipCode,
};

pub(crate) const FARMER_PHONE: &str = "+90 555 686 6386";

pub(crate) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub identity: Arc<MockIdentityProvider>,
    pub messenger: Arc<MockMessageDispatcher>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<SponsorshipService<MemoryStore>>,
    pub sponsor_id: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_messenger(MockMessageDispatcher::new()).await
    }

    pub async fn with_messenger(messenger: MockMessageDispatcher) -> Self {
        Self::build(messenger, SponsorshipSettings::default()).await
    }

    pub async fn build(messenger: MockMessageDispatcher, settings: SponsorshipSettings) -> Self {
        let store = MemoryStore::with_default_tiers();
        let identity = Arc::new(MockIdentityProvider::new());
        let messenger = Arc::new(messenger);
        let clock = Arc::new(ManualClock::new(start()));
        let sponsor_id = identity.add_sponsor("Acme Seeds").await;

        let service = SponsorshipService::new(
            store.clone(),
            messenger.clone(),
            identity.clone(),
            settings,
        )
        .with_clock(clock.clone());

        Self {
            store,
            identity,
            messenger,
            clock,
            service: Arc::new(service),
            sponsor_id,
        }
    }

    pub async fn purchase(&self, tier: &str, quantity: i32) -> PurchasedCodes {
        self.purchase_for(self.sponsor_id, tier, quantity).await
    }

    pub async fn purchase_for(&self, sponsor_id: Uuid, tier: &str, quantity: i32) -> PurchasedCodes {
        let request: PurchaseCodesRequest = serde_json::from_value(serde_json::json!({
            "tier": tier,
            "quantity": quantity,
            "unit_price_cents": 2500,
        }))
        .unwrap();
        self.service
            .purchase_codes(sponsor_id, &request)
            .await
            .unwrap()
    }

    pub async fn farmer(&self) -> Caller {
        let user_id = self.identity.add_user(None, Some(FARMER_PHONE)).await;
        Caller {
            user_id,
            email: None,
            phone: Some(FARMER_PHONE.to_string()),
        }
    }

    pub async fn dealer(&self, email: &str) -> Caller {
        let user_id = self.identity.add_user(Some(email), None).await;
        Caller {
            user_id,
            email: Some(email.to_string()),
            phone: None,
        }
    }

    pub async fn stats(&self) -> PoolStats {
        self.store
            .pool_stats(self.sponsor_id, None, self.clock_now())
            .await
            .unwrap()
    }

    pub async fn code(&self, id: Uuid) -> SponsorshipCode {
        self.store.snapshot().await.codes[&id].clone()
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use super::clock::Clock;
        self.clock.now()
    }
}

pub(crate) fn farmer_invitation(count: i32, tier: Option<&str>) -> NewInvitation {
    NewInvitation {
        kind: InvitationKind::Farmer,
        invitation_type: InvitationType::Invite,
        recipient: Recipient {
            name: Some("Ayse Farmer".to_string()),
            email: None,
            phone: Some(FARMER_PHONE.to_string()),
        },
        code_count: count,
        package_tier: tier.map(String::from),
        purchase_id: None,
        channel: None,
        notes: None,
    }
}

pub(crate) fn dealer_invitation(email: &str, count: i32, tier: Option<&str>) -> NewInvitation {
    NewInvitation {
        kind: InvitationKind::Dealer,
        invitation_type: InvitationType::Invite,
        recipient: Recipient {
            name: Some("North Dealer".to_string()),
            email: Some(email.to_string()),
            phone: None,
        },
        code_count: count,
        package_tier: tier.map(String::from),
        purchase_id: None,
        channel: None,
        notes: None,
    }
}

pub(crate) fn with_channel(mut input: NewInvitation, channel: DeliveryChannel) -> NewInvitation {
    input.channel = Some(channel);
    input
}
