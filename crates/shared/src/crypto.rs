//! Cryptographic utilities for invitation tokens and temporary credentials.

use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};

/// Number of random bytes in an invitation token (128 bits).
pub const INVITATION_TOKEN_BYTES: usize = 16;

/// Alphabet for temporary passwords. Omits 0/O, 1/l/I.
const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates an opaque invitation token: 128 bits from the OS RNG, lower-case hex.
pub fn generate_invitation_token() -> String {
    let mut bytes = [0u8; INVITATION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Short, non-reversible identifier for a token, safe to put in logs.
pub fn token_fingerprint(token: &str) -> String {
    sha256_hex(token)[..12].to_string()
}

/// Generates a temporary password for auto-provisioned accounts.
pub fn generate_temporary_password(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_invitation_token_is_128_bit_hex() {
        let token = generate_invitation_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token, token.to_lowercase());
    }

    #[test]
    fn test_invitation_tokens_are_unique() {
        let a = generate_invitation_token();
        let b = generate_invitation_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_fingerprint_is_stable_and_short() {
        let token = "0123456789abcdef0123456789abcdef";
        assert_eq!(token_fingerprint(token), token_fingerprint(token));
        assert_eq!(token_fingerprint(token).len(), 12);
    }

    #[test]
    fn test_temporary_password_length_and_alphabet() {
        let password = generate_temporary_password(12);
        assert_eq!(password.len(), 12);
        assert!(password.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_temporary_password_excludes_ambiguous_characters() {
        let password = generate_temporary_password(500);
        for ambiguous in ['0', 'O', '1', 'l', 'I'] {
            assert!(!password.contains(ambiguous));
        }
    }
}
