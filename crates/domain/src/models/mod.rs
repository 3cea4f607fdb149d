//! Domain models for sponsorship code distribution.

pub mod code;
pub mod invitation;
pub mod purchase;
pub mod subscription;
pub mod tier;
pub mod transfer;

pub use code::{
    generate_sponsorship_code, CodeState, CodeValidity, Hold, PoolStats, RecipientRef,
    Reservation, SponsorshipCode,
};
pub use invitation::{
    Caller, DeliveryChannel, DeliveryStatus, Invitation, InvitationKind, InvitationStatus,
    InvitationType, NewInvitation, Recipient,
};
pub use purchase::{PaymentStatus, PurchaseUsage, SponsorshipPurchase};
pub use subscription::{Subscription, SubscriptionStatus};
pub use tier::{SubscriptionTier, TierName};
pub use transfer::{ReclaimCodesRequest, TransferCodesRequest};
