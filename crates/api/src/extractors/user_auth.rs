//! User JWT authentication extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::Caller;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated user taken from a Bearer access token.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// User ID from the JWT subject claim.
    pub user_id: Uuid,
    /// JWT ID (jti) for session tracking.
    pub jti: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl UserAuth {
    /// Identity used to match the caller against an invitation recipient.
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id,
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }

        let token = bearer_token(parts)?;

        let claims = state.jwt.validate_access_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected access token");
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let user_id = claims
            .user_id()
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        let auth = UserAuth {
            user_id,
            jti: claims.jti,
            email: claims.email,
            phone: claims.phone,
        };
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts_with(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_or_malformed_header_rejected() {
        assert!(matches!(
            bearer_token(&parts_with(None)),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&parts_with(Some("Basic dXNlcjpwYXNz"))),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&parts_with(Some("Bearer   "))),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_caller_carries_contact_claims() {
        let auth = UserAuth {
            user_id: Uuid::new_v4(),
            jti: "jti".to_string(),
            email: Some("dealer@example.com".to_string()),
            phone: None,
        };
        let caller = auth.caller();
        assert_eq!(caller.user_id, auth.user_id);
        assert_eq!(caller.email.as_deref(), Some("dealer@example.com"));
        assert!(caller.phone.is_none());
    }
}
