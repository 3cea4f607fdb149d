//! Dealer and farmer invitation routes.
//!
//! Both kinds share the same handlers; the path decides the kind.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::invitation::{
    AcceptInvitationRequest, AcceptInvitationResponse, BulkFarmerInvitationRequest,
    BulkInvitationResponse, CancelInvitationResponse, CreateDealerInvitationRequest,
    CreateFarmerInvitationRequest, CreateInvitationResponse, InvitationResponse,
    ListInvitationsQuery, ListInvitationsResponse, ResendInvitationRequest,
};
use domain::models::{InvitationKind, NewInvitation};
use shared::crypto::token_fingerprint;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::metrics::{
    record_codes_released, record_invitation_accepted, record_invitation_created, ReleaseReason,
};

// ============================================================================
// Creation
// ============================================================================

/// POST /api/v1/sponsorship/dealer-invitations
pub async fn create_dealer_invitation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateDealerInvitationRequest>,
) -> Result<(StatusCode, Json<CreateInvitationResponse>), ApiError> {
    request.validate()?;
    create(&state, &user_auth, request.into()).await
}

/// POST /api/v1/sponsorship/farmer-invitations
pub async fn create_farmer_invitation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateFarmerInvitationRequest>,
) -> Result<(StatusCode, Json<CreateInvitationResponse>), ApiError> {
    request.validate()?;
    create(&state, &user_auth, request.into()).await
}

async fn create(
    state: &AppState,
    user_auth: &UserAuth,
    input: NewInvitation,
) -> Result<(StatusCode, Json<CreateInvitationResponse>), ApiError> {
    let kind = input.kind;
    let created = state
        .service
        .create_invitation(user_auth.user_id, input)
        .await?;
    record_invitation_created(kind);

    let invitation = &created.invitation;
    let link = state
        .service
        .settings()
        .for_kind(kind)
        .deep_link(&invitation.token);

    info!(
        sponsor_id = %user_auth.user_id,
        invitation_id = %invitation.id,
        kind = %kind,
        token = %token_fingerprint(&invitation.token),
        "Invitation issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateInvitationResponse {
            invitation: InvitationResponse::from_invitation(invitation, state.service.now()),
            token: invitation.token.clone(),
            invitation_link: link,
            code_ids: created.code_ids,
            temporary_password: created.temporary_password,
        }),
    ))
}

/// Invite many farmers; each row succeeds or fails on its own.
///
/// POST /api/v1/sponsorship/farmer-invitations/bulk
pub async fn bulk_create_farmer_invitations(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<BulkFarmerInvitationRequest>,
) -> Result<Json<BulkInvitationResponse>, ApiError> {
    request.validate()?;

    let response = state
        .service
        .bulk_create_farmer_invitations(user_auth.user_id, request)
        .await?;

    for _ in 0..response.succeeded {
        record_invitation_created(InvitationKind::Farmer);
    }

    Ok(Json(response))
}

// ============================================================================
// Listing
// ============================================================================

/// GET /api/v1/sponsorship/dealer-invitations
pub async fn list_dealer_invitations(
    state: State<AppState>,
    user_auth: UserAuth,
    query: Query<ListInvitationsQuery>,
) -> Result<Json<ListInvitationsResponse>, ApiError> {
    list(state, user_auth, InvitationKind::Dealer, query).await
}

/// GET /api/v1/sponsorship/farmer-invitations
pub async fn list_farmer_invitations(
    state: State<AppState>,
    user_auth: UserAuth,
    query: Query<ListInvitationsQuery>,
) -> Result<Json<ListInvitationsResponse>, ApiError> {
    list(state, user_auth, InvitationKind::Farmer, query).await
}

async fn list(
    State(state): State<AppState>,
    user_auth: UserAuth,
    kind: InvitationKind,
    Query(query): Query<ListInvitationsQuery>,
) -> Result<Json<ListInvitationsResponse>, ApiError> {
    let page = state
        .service
        .list_invitations(user_auth.user_id, kind, query)
        .await?;

    let now = state.service.now();
    Ok(Json(ListInvitationsResponse {
        data: page
            .invitations
            .iter()
            .map(|inv| InvitationResponse::from_invitation(inv, now))
            .collect(),
        next_cursor: page.next_cursor,
    }))
}

// ============================================================================
// Acceptance
// ============================================================================

/// POST /api/v1/sponsorship/dealer-invitations/accept
pub async fn accept_dealer_invitation(
    state: State<AppState>,
    user_auth: UserAuth,
    request: Json<AcceptInvitationRequest>,
) -> Result<Json<AcceptInvitationResponse>, ApiError> {
    accept(state, user_auth, InvitationKind::Dealer, request).await
}

/// POST /api/v1/sponsorship/farmer-invitations/accept
pub async fn accept_farmer_invitation(
    state: State<AppState>,
    user_auth: UserAuth,
    request: Json<AcceptInvitationRequest>,
) -> Result<Json<AcceptInvitationResponse>, ApiError> {
    accept(state, user_auth, InvitationKind::Farmer, request).await
}

async fn accept(
    State(state): State<AppState>,
    user_auth: UserAuth,
    kind: InvitationKind,
    Json(request): Json<AcceptInvitationRequest>,
) -> Result<Json<AcceptInvitationResponse>, ApiError> {
    request.validate()?;

    let accepted = state
        .service
        .accept_invitation(kind, request.token.trim(), &user_auth.caller())
        .await?;
    record_invitation_accepted(kind);

    let invitation = accepted.invitation;
    Ok(Json(AcceptInvitationResponse {
        invitation_id: invitation.id,
        status: invitation.status,
        code_ids: accepted.codes.iter().map(|c| c.id).collect(),
        codes: accepted.codes.into_iter().map(|c| c.code).collect(),
        accepted_at: invitation
            .accepted_at
            .unwrap_or_else(|| state.service.now()),
    }))
}

// ============================================================================
// Cancellation and resend
// ============================================================================

/// POST /api/v1/sponsorship/dealer-invitations/:id/cancel
pub async fn cancel_dealer_invitation(
    state: State<AppState>,
    user_auth: UserAuth,
    path: Path<Uuid>,
) -> Result<Json<CancelInvitationResponse>, ApiError> {
    cancel(state, user_auth, InvitationKind::Dealer, path).await
}

/// POST /api/v1/sponsorship/farmer-invitations/:id/cancel
pub async fn cancel_farmer_invitation(
    state: State<AppState>,
    user_auth: UserAuth,
    path: Path<Uuid>,
) -> Result<Json<CancelInvitationResponse>, ApiError> {
    cancel(state, user_auth, InvitationKind::Farmer, path).await
}

async fn cancel(
    State(state): State<AppState>,
    user_auth: UserAuth,
    kind: InvitationKind,
    Path(invitation_id): Path<Uuid>,
) -> Result<Json<CancelInvitationResponse>, ApiError> {
    let cancelled = state
        .service
        .cancel_invitation(kind, invitation_id, user_auth.user_id)
        .await?;
    record_codes_released(ReleaseReason::Cancelled, cancelled.released);

    Ok(Json(CancelInvitationResponse {
        invitation_id: cancelled.invitation.id,
        status: cancelled.invitation.status,
        released_count: cancelled.released,
    }))
}

/// POST /api/v1/sponsorship/dealer-invitations/:id/resend
pub async fn resend_dealer_invitation(
    state: State<AppState>,
    user_auth: UserAuth,
    path: Path<Uuid>,
    request: Json<ResendInvitationRequest>,
) -> Result<Json<InvitationResponse>, ApiError> {
    resend(state, user_auth, InvitationKind::Dealer, path, request).await
}

/// POST /api/v1/sponsorship/farmer-invitations/:id/resend
pub async fn resend_farmer_invitation(
    state: State<AppState>,
    user_auth: UserAuth,
    path: Path<Uuid>,
    request: Json<ResendInvitationRequest>,
) -> Result<Json<InvitationResponse>, ApiError> {
    resend(state, user_auth, InvitationKind::Farmer, path, request).await
}

async fn resend(
    State(state): State<AppState>,
    user_auth: UserAuth,
    kind: InvitationKind,
    Path(invitation_id): Path<Uuid>,
    Json(request): Json<ResendInvitationRequest>,
) -> Result<Json<InvitationResponse>, ApiError> {
    let invitation = state
        .service
        .resend_invitation(kind, invitation_id, user_auth.user_id, request.channel)
        .await?;

    Ok(Json(InvitationResponse::from_invitation(
        &invitation,
        state.service.now(),
    )))
}
