use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::error::{IdentityError, SponsorshipError};
use domain::models::CodeValidity;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Message shared by every failure that must not reveal whether an
/// invitation exists.
pub const UNRESOLVED_INVITATION_MESSAGE: &str = "Invitation not found or already resolved";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Insufficient codes: requested {requested}, available {available}")]
    InsufficientInventory { requested: usize, available: usize },

    #[error("Code unavailable: {0}")]
    CodeUnavailable(CodeValidity),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid request")]
    InvalidFields(Vec<ValidationDetail>),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Gone(msg) => (StatusCode::GONE, "expired", msg),
            ApiError::InsufficientInventory {
                requested,
                available,
            } => {
                details = Some(json!({ "requested": requested, "available": available }));
                (
                    StatusCode::CONFLICT,
                    "insufficient_codes",
                    format!(
                        "Not enough available codes: requested {}, available {}",
                        requested, available
                    ),
                )
            }
            ApiError::CodeUnavailable(validity) => {
                details = Some(json!({ "validity": validity }));
                (
                    StatusCode::CONFLICT,
                    "code_unavailable",
                    validity.message().to_string(),
                )
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::InvalidFields(fields) => {
                let message = match fields.as_slice() {
                    [single] => single.message.clone(),
                    _ => format!("{} validation errors", fields.len()),
                };
                details = serde_json::to_value(&fields).ok();
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SponsorshipError> for ApiError {
    fn from(err: SponsorshipError) -> Self {
        match err {
            SponsorshipError::NotFound(msg) => ApiError::NotFound(msg),
            // Unknown, resolved and misaddressed tokens share one response.
            SponsorshipError::AlreadyResolved | SponsorshipError::NotAuthorized => {
                ApiError::NotFound(UNRESOLVED_INVITATION_MESSAGE.to_string())
            }
            SponsorshipError::Expired => ApiError::Gone(err.to_string()),
            SponsorshipError::InsufficientInventory {
                requested,
                available,
            } => ApiError::InsufficientInventory {
                requested,
                available,
            },
            SponsorshipError::Forbidden(msg) => ApiError::Forbidden(msg),
            SponsorshipError::Validation(msg) => ApiError::Validation(msg),
            SponsorshipError::CodeUnavailable(validity) => ApiError::CodeUnavailable(validity),
            SponsorshipError::Identity(IdentityError::EmailTaken) => {
                ApiError::Conflict(IdentityError::EmailTaken.to_string())
            }
            SponsorshipError::Identity(e) => ApiError::Internal(e.to_string()),
            SponsorshipError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(format!("Database error: {}", err))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", field)),
                })
            })
            .collect();

        ApiError::InvalidFields(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use domain::error::StoreError;
    use validator::Validate;

    async fn body_json(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn status_of(err: SponsorshipError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_domain_error_status_mapping() {
        assert_eq!(status_of(SponsorshipError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(SponsorshipError::AlreadyResolved), StatusCode::NOT_FOUND);
        assert_eq!(status_of(SponsorshipError::NotAuthorized), StatusCode::NOT_FOUND);
        assert_eq!(status_of(SponsorshipError::Expired), StatusCode::GONE);
        assert_eq!(status_of(SponsorshipError::insufficient(5, 3)), StatusCode::CONFLICT);
        assert_eq!(status_of(SponsorshipError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(SponsorshipError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(SponsorshipError::CodeUnavailable(CodeValidity::AlreadyUsed)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::Backend("down".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_not_authorized_is_indistinguishable_from_unknown() {
        let mismatch = body_json(SponsorshipError::NotAuthorized.into()).await;
        let unknown = body_json(SponsorshipError::AlreadyResolved.into()).await;
        assert_eq!(mismatch, unknown);

        let (status, body) = mismatch;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], UNRESOLVED_INVITATION_MESSAGE);
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_insufficient_inventory_details() {
        let (status, body) = body_json(SponsorshipError::insufficient(5, 3).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "insufficient_codes");
        assert_eq!(body["details"]["requested"], 5);
        assert_eq!(body["details"]["available"], 3);
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let (status, body) =
            body_json(SponsorshipError::from(StoreError::Backend("password=hunter2".into())).into())
                .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(range(min = 1, message = "code_count must be at least 1"))]
        code_count: i32,
    }

    #[tokio::test]
    async fn test_validation_errors_list_fields() {
        let errors = Sample { code_count: 0 }.validate().unwrap_err();
        let (status, body) = body_json(errors.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "code_count must be at least 1");
        assert_eq!(body["details"][0]["field"], "code_count");
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            ApiError::InsufficientInventory {
                requested: 5,
                available: 3
            }
            .to_string(),
            "Insufficient codes: requested 5, available 3"
        );
        assert_eq!(ApiError::Gone("x".into()).to_string(), "Gone: x");
    }
}
