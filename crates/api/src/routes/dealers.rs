//! Direct sponsor-to-dealer transfer and reclaim routes.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::transfer::{ReclaimCodesResponse, TransferCodesResponse};
use domain::models::{ReclaimCodesRequest, TransferCodesRequest};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::metrics::{record_codes_reclaimed, record_codes_transferred};

/// POST /api/v1/sponsorship/dealers/:dealer_id/transfer
pub async fn transfer_codes(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(dealer_id): Path<Uuid>,
    Json(request): Json<TransferCodesRequest>,
) -> Result<Json<TransferCodesResponse>, ApiError> {
    request.validate()?;

    let outcome = state
        .service
        .transfer_codes(user_auth.user_id, dealer_id, &request)
        .await?;
    record_codes_transferred(outcome.code_ids.len());

    Ok(Json(TransferCodesResponse {
        dealer_id,
        transferred_count: outcome.code_ids.len(),
        code_ids: outcome.code_ids,
        transferred_at: outcome.transferred_at,
    }))
}

/// Takes back every unused code the dealer holds. The body is optional.
///
/// POST /api/v1/sponsorship/dealers/:dealer_id/reclaim
pub async fn reclaim_codes(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(dealer_id): Path<Uuid>,
    request: Option<Json<ReclaimCodesRequest>>,
) -> Result<Json<ReclaimCodesResponse>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;

    let outcome = state
        .service
        .reclaim_codes(user_auth.user_id, dealer_id, &request)
        .await?;
    record_codes_reclaimed(outcome.code_ids.len());

    Ok(Json(ReclaimCodesResponse {
        dealer_id,
        reclaimed_count: outcome.code_ids.len(),
        code_ids: outcome.code_ids,
        invitations_reclaimed: outcome.invitations_reclaimed,
        reclaimed_at: outcome.reclaimed_at,
    }))
}
