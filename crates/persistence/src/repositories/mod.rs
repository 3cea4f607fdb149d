//! Repository implementations for database operations.

pub mod code;
pub mod invitation;
pub mod purchase;
pub mod subscription;
pub mod tier;
pub mod user;

pub use code::CodeRepository;
pub use invitation::{InvitationListFilter, InvitationRepository};
pub use purchase::PurchaseRepository;
pub use subscription::SubscriptionRepository;
pub use tier::TierRepository;
pub use user::UserRepository;
