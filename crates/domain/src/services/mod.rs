//! Domain services for sponsorship code distribution.
//!
//! [`SponsorshipService`] is generic over a [`SponsorshipStore`], so the same
//! allocation and lifecycle logic runs against PostgreSQL in production and
//! the in-memory store in tests.

pub mod allocation;
pub mod clock;
pub mod identity;
pub mod invitations;
pub mod memory_store;
pub mod messaging;
pub mod purchase;
pub mod redemption;
pub mod settings;
pub mod sponsorship;
pub mod store;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

pub use allocation::{select_codes, CodeFilter, CodeOrder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{IdentityProvider, MockIdentityProvider, NewDealerAccount};
pub use invitations::{
    AcceptedInvitation, CancelledInvitation, CreatedInvitation, InvitationPage, SweepOutcome,
};
pub use memory_store::MemoryStore;
pub use messaging::{DeliveryReceipt, MessageDispatcher, MockMessageDispatcher};
pub use purchase::PurchasedCodes;
pub use redemption::{normalize_code, Redemption};
pub use settings::{InvitationSettings, SponsorshipSettings};
pub use sponsorship::SponsorshipService;
pub use store::{with_retry, InvitationQuery, SponsorshipStore};
pub use transfer::{ReclaimOutcome, TransferOutcome};
