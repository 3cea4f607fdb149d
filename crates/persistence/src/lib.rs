//! Persistence layer for the sponsorship service.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - The PostgreSQL [`SponsorshipStore`](domain::services::SponsorshipStore)
//!   and identity provider built on them

pub mod db;
pub mod entities;
pub mod identity;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use identity::PgIdentityProvider;
pub use store::PgSponsorshipStore;
