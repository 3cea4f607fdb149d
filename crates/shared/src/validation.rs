//! Custom `validator` functions shared by request DTOs.

use validator::ValidationError;

use crate::phone::normalize_phone;

/// Subscription tier names accepted as package filters.
pub const TIER_NAMES: [&str; 4] = ["S", "M", "L", "XL"];

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates that a phone number normalizes to 10-15 digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let normalized = normalize_phone(phone);
    if (10..=15).contains(&normalized.len()) && normalized.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(error("phone_format", "Phone number must contain 10 to 15 digits"))
    }
}

/// Validates a tier name (S, M, L or XL, case-insensitive).
pub fn validate_tier_name(tier: &str) -> Result<(), ValidationError> {
    let upper = tier.trim().to_uppercase();
    if TIER_NAMES.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(error("tier_name", "Tier must be one of S, M, L, XL"))
    }
}

/// Validates a code prefix: 2-10 upper-case ASCII letters or digits.
pub fn validate_code_prefix(prefix: &str) -> Result<(), ValidationError> {
    let valid_length = (2..=10).contains(&prefix.len());
    let valid_chars = prefix
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid_length && valid_chars {
        Ok(())
    } else {
        Err(error(
            "code_prefix",
            "Code prefix must be 2-10 upper-case letters or digits",
        ))
    }
}
