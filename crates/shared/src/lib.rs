//! Shared utilities and common types for the sponsorship backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Token, password and fingerprint generation
//! - Password hashing with Argon2id
//! - Phone and email normalization for recipient matching
//! - JWT validation for authenticated callers
//! - Cursor pagination and `validator` helpers

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod password;
pub mod phone;
pub mod validation;
