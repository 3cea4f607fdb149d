//! HTTP route handlers.

pub mod codes;
pub mod dealers;
pub mod health;
pub mod invitations;
pub mod purchases;
