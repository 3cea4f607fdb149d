//! Domain layer for the sponsorship platform.
//!
//! This crate contains:
//! - Domain models (SponsorshipCode, Hold, Invitation, Purchase, Subscription)
//! - The allocation engine and invitation lifecycle services
//! - The storage and collaborator traits they run against
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
