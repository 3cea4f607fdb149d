//! Database entity definitions.
//!
//! Row mappings for sqlx `FromRow`, with conversions into domain models.

pub mod code;
pub mod invitation;
pub mod purchase;
pub mod subscription;
pub mod tier;
pub mod user;

pub use code::{HoldColumns, HoldStateDb, PoolStatsEntity, SponsorshipCodeEntity, CODE_COLUMNS};
pub use invitation::{
    DeliveryChannelDb, InvitationEntity, InvitationKindDb, InvitationStatusDb, InvitationTypeDb,
    INVITATION_COLUMNS,
};
pub use purchase::{PaymentStatusDb, SponsorshipPurchaseEntity};
pub use subscription::{SubscriptionEntity, SubscriptionStatusDb};
pub use tier::SubscriptionTierEntity;
pub use user::{UserEntity, SPONSOR_ROLE};
