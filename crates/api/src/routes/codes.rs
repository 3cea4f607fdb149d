//! Code pool routes: preview, stats, validation, redemption, deactivation.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use domain::error::SponsorshipError;
use domain::models::subscription::{
    RedeemCodeRequest, RedeemCodeResponse, ValidateCodeRequest, ValidateCodeResponse,
};
use domain::models::{CodeValidity, PoolStats, SponsorshipCode};
use domain::services::{normalize_code, SponsorshipStore};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::metrics::record_code_redeemed;

const MAX_PREVIEW_COUNT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct AvailableCodesQuery {
    pub count: usize,
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PoolStatsQuery {
    pub purchase_id: Option<Uuid>,
}

/// One code in a selection preview.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AvailableCode {
    pub id: Uuid,
    pub code: String,
    pub purchase_id: Uuid,
    pub tier_id: Uuid,
    pub expiry_date: DateTime<Utc>,
}

impl From<SponsorshipCode> for AvailableCode {
    fn from(code: SponsorshipCode) -> Self {
        Self {
            id: code.id,
            code: code.code,
            purchase_id: code.purchase_id,
            tier_id: code.tier_id,
            expiry_date: code.expiry_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AvailableCodesResponse {
    pub requested: usize,
    pub available: usize,
    pub data: Vec<AvailableCode>,
}

/// Read-only preview of the codes an invitation would receive now.
///
/// GET /api/v1/sponsorship/codes/available?count&tier
pub async fn available_codes(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<AvailableCodesQuery>,
) -> Result<Json<AvailableCodesResponse>, ApiError> {
    if query.count == 0 || query.count > MAX_PREVIEW_COUNT {
        return Err(ApiError::Validation(format!(
            "count must be between 1 and {}",
            MAX_PREVIEW_COUNT
        )));
    }

    let codes = state
        .service
        .select_codes(user_auth.user_id, query.count, query.tier.as_deref())
        .await?;

    Ok(Json(AvailableCodesResponse {
        requested: query.count,
        available: codes.len(),
        data: codes.into_iter().map(AvailableCode::from).collect(),
    }))
}

/// Pool counters for the caller, optionally scoped to one purchase.
///
/// GET /api/v1/sponsorship/codes/stats?purchase_id
pub async fn pool_stats(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<PoolStatsQuery>,
) -> Result<Json<PoolStats>, ApiError> {
    let stats = state
        .service
        .pool_stats(user_auth.user_id, query.purchase_id)
        .await?;
    Ok(Json(stats))
}

/// POST /api/v1/sponsorship/codes/validate
pub async fn validate_code(
    State(state): State<AppState>,
    _user_auth: UserAuth,
    Json(request): Json<ValidateCodeRequest>,
) -> Result<Json<ValidateCodeResponse>, ApiError> {
    request.validate()?;

    let (validity, code) = state.service.validate_code(&request.code).await?;

    let tier = match &code {
        Some(code) => state
            .service
            .store()
            .find_tier(code.tier_id)
            .await
            .map_err(SponsorshipError::from)?
            .map(|t| t.name),
        None => None,
    };

    Ok(Json(ValidateCodeResponse {
        code: code
            .as_ref()
            .map(|c| c.code.clone())
            .unwrap_or_else(|| normalize_code(&request.code)),
        validity,
        is_valid: validity == CodeValidity::Valid,
        message: validity.message().to_string(),
        tier,
        expiry_date: code.map(|c| c.expiry_date),
    }))
}

/// Redeem a code for the caller.
///
/// POST /api/v1/sponsorship/codes/redeem
pub async fn redeem_code(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<RedeemCodeRequest>,
) -> Result<Json<RedeemCodeResponse>, ApiError> {
    request.validate()?;

    let redemption = state.service.redeem(&request.code, user_auth.user_id).await?;
    record_code_redeemed();

    Ok(Json(RedeemCodeResponse {
        subscription_id: redemption.subscription.id,
        status: redemption.subscription.status,
        tier: redemption.tier.name,
        start_date: redemption.subscription.start_date,
        end_date: redemption.subscription.end_date,
        queued: redemption.queued,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DeactivateCodeResponse {
    pub id: Uuid,
    pub code: String,
    pub is_active: bool,
}

/// POST /api/v1/sponsorship/codes/:code/deactivate
pub async fn deactivate_code(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(code): Path<String>,
) -> Result<Json<DeactivateCodeResponse>, ApiError> {
    let code = state
        .service
        .deactivate_code(&code, user_auth.user_id)
        .await?;

    info!(code_id = %code.id, sponsor_id = %user_auth.user_id, "Code deactivated by sponsor");

    Ok(Json(DeactivateCodeResponse {
        id: code.id,
        code: code.code,
        is_active: code.is_active,
    }))
}
