//! Code purchase routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::purchase::{PurchaseCodesRequest, PurchaseResponse};
use domain::models::PurchaseUsage;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Buy a batch of codes for a tier.
///
/// POST /api/v1/sponsorship/purchases
pub async fn purchase_codes(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<PurchaseCodesRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    request.validate()?;

    let purchased = state
        .service
        .purchase_codes(user_auth.user_id, &request)
        .await?;

    info!(
        sponsor_id = %user_auth.user_id,
        purchase_id = %purchased.purchase.id,
        quantity = purchased.codes.len(),
        "Codes purchased"
    );

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            id: purchased.purchase.id,
            tier: purchased.tier.name,
            quantity: purchased.purchase.quantity,
            total_amount_cents: purchased.purchase.total_amount_cents,
            currency: purchased.purchase.currency,
            payment_status: purchased.purchase.payment_status,
            purchased_at: purchased.purchase.purchased_at,
            codes: purchased.codes.into_iter().map(|c| c.code).collect(),
        }),
    ))
}

/// Usage counters for one purchase.
///
/// GET /api/v1/sponsorship/purchases/:id/usage
pub async fn purchase_usage(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<PurchaseUsage>, ApiError> {
    let usage = state
        .service
        .purchase_usage(user_auth.user_id, purchase_id)
        .await?;
    Ok(Json(usage))
}
