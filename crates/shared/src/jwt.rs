//! JWT access-token validation (RS256).
//!
//! Tokens are issued by the identity service; this backend validates them and
//! reads the caller's verified contact details from the claims. Issuing is kept
//! for integration tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Type of JWT token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims carried by caller tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: TokenType,
    /// Verified email of the caller, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Verified phone of the caller, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Claims {
    /// Parses the subject as a user ID.
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// Contact details embedded in an issued token.
#[derive(Debug, Clone, Default)]
pub struct TokenContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Default leeway in seconds for clock skew tolerance
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Keys and lifetimes for JWT handling.
#[derive(Clone)]
pub struct JwtConfig {
    /// Absent when the service only validates tokens.
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    pub access_token_expiry_secs: i64,
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl JwtConfig {
    /// Creates a config from an RSA key pair in PEM format.
    pub fn new(
        private_key_pem: &str,
        public_key_pem: &str,
        access_token_expiry_secs: i64,
        leeway_secs: u64,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid private key: {}", e)))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key: Some(encoding_key),
            decoding_key,
            access_token_expiry_secs,
            leeway_secs,
        })
    }

    /// Creates a config that validates tokens but cannot issue them.
    pub fn validation_only(public_key_pem: &str, leeway_secs: u64) -> Result<Self, JwtError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key: None,
            decoding_key,
            access_token_expiry_secs: 0,
            leeway_secs,
        })
    }

    /// HS256 config for unit tests only.
    #[cfg(test)]
    pub fn new_for_testing(secret: &str) -> Self {
        Self {
            encoding_key: Some(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry_secs: 900,
            leeway_secs: 0,
        }
    }

    /// Issues an access token for the user. Returns `(token, jti)`.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        contact: &TokenContact,
    ) -> Result<(String, String), JwtError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + Duration::seconds(self.access_token_expiry_secs)).timestamp(),
            iat: now.timestamp(),
            jti: jti.clone(),
            token_type: TokenType::Access,
            email: contact.email.clone(),
            phone: contact.phone.clone(),
        };

        let encoding_key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| JwtError::EncodingError("No signing key configured".to_string()))?;
        let token = encode(&Header::new(self.algorithm()), &claims, encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, jti))
    }

    /// Validates an access token and returns its claims.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm());
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            })?
            .claims;

        if claims.token_type != TokenType::Access {
            return Err(JwtError::InvalidToken);
        }
        Ok(claims)
    }

    fn algorithm(&self) -> Algorithm {
        // Unit tests sign with a shared secret.
        #[cfg(test)]
        {
            Algorithm::HS256
        }
        #[cfg(not(test))]
        {
            Algorithm::RS256
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig::new_for_testing("test_secret_key_for_jwt_testing_12345")
    }

    #[test]
    fn test_issue_and_validate_carries_contact() {
        let config = config();
        let user_id = Uuid::new_v4();
        let contact = TokenContact {
            email: Some("dealer@example.com".to_string()),
            phone: Some("05556866386".to_string()),
        };

        let (token, jti) = config.issue_access_token(user_id, &contact).unwrap();
        let claims = config.validate_access_token(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.email.as_deref(), Some("dealer@example.com"));
        assert_eq!(claims.phone.as_deref(), Some("05556866386"));
    }

    #[test]
    fn test_contact_claims_are_optional() {
        let config = config();
        let (token, _) = config
            .issue_access_token(Uuid::new_v4(), &TokenContact::default())
            .unwrap();
        let claims = config.validate_access_token(&token).unwrap();
        assert!(claims.email.is_none());
        assert!(claims.phone.is_none());

        let raw = serde_json::to_string(&claims).unwrap();
        assert!(!raw.contains("email"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = config();
        config.access_token_expiry_secs = -120;
        let (token, _) = config
            .issue_access_token(Uuid::new_v4(), &TokenContact::default())
            .unwrap();

        let result = config.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_token_signed_with_other_key_rejected() {
        let (token, _) = config()
            .issue_access_token(Uuid::new_v4(), &TokenContact::default())
            .unwrap();
        let other = JwtConfig::new_for_testing("a_different_secret_entirely_0987");

        assert!(matches!(
            other.validate_access_token(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_config_without_signing_key_cannot_issue() {
        let mut config = config();
        config.encoding_key = None;
        let result = config.issue_access_token(Uuid::new_v4(), &TokenContact::default());
        assert!(matches!(result, Err(JwtError::EncodingError(_))));
    }

    #[test]
    fn test_malformed_token() {
        assert!(config().validate_access_token("not_a_jwt").is_err());
    }

    #[test]
    fn test_invalid_subject() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            exp: 0,
            iat: 0,
            jti: String::new(),
            token_type: TokenType::Access,
            email: None,
            phone: None,
        };
        assert!(matches!(claims.user_id(), Err(JwtError::InvalidToken)));
    }
}
