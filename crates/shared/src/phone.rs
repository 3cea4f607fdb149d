//! Phone and email normalization used when matching invitation recipients.

/// Normalizes a phone number to its local comparison form.
///
/// Strips spaces, dashes, parentheses and `+`. A 12-digit number with the
/// `90` country code is rewritten to the 11-digit local form `0XXXXXXXXXX`.
pub fn normalize_phone(phone: &str) -> String {
    let stripped: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();

    if stripped.len() == 12 && stripped.starts_with("90") {
        format!("0{}", &stripped[2..])
    } else {
        stripped
    }
}

/// Returns true when both phones normalize to the same non-empty value.
pub fn phones_match(a: &str, b: &str) -> bool {
    let a = normalize_phone(a);
    !a.is_empty() && a.eq_ignore_ascii_case(&normalize_phone(b))
}

/// Trims and lower-cases an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Case-insensitive exact email comparison. Empty addresses never match.
pub fn emails_match(a: &str, b: &str) -> bool {
    let a = normalize_email(a);
    !a.is_empty() && a == normalize_email(b)
}
