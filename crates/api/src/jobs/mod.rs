//! Background job scheduler and job implementations.

mod expire_invitations;
mod scheduler;

pub use expire_invitations::ExpireInvitationsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
