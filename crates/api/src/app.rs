use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::SponsorshipService;
use persistence::{PgIdentityProvider, PgSponsorshipStore};
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{codes, dealers, health, invitations, purchases};
use crate::services::messaging::{build_dispatcher, MessagingError};

pub type Service = SponsorshipService<PgSponsorshipStore>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub service: Arc<Service>,
    pub jwt: Arc<JwtConfig>,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid JWT configuration: {0}")]
    Jwt(#[from] JwtError),

    #[error("Invalid messaging configuration: {0}")]
    Messaging(#[from] MessagingError),
}

impl AppState {
    /// Wires the service against PostgreSQL and the configured collaborators.
    pub fn new(config: Config, pool: PgPool) -> Result<Self, StartupError> {
        let jwt = if config.jwt.private_key.trim().is_empty() {
            JwtConfig::validation_only(&config.jwt.public_key, config.jwt.leeway_secs)?
        } else {
            JwtConfig::new(
                &config.jwt.private_key,
                &config.jwt.public_key,
                config.jwt.access_token_expiry_secs,
                config.jwt.leeway_secs,
            )?
        };

        let dispatcher = build_dispatcher(&config.messaging)?;
        let service = SponsorshipService::new(
            PgSponsorshipStore::new(pool.clone()),
            dispatcher,
            Arc::new(PgIdentityProvider::new(pool.clone())),
            config.sponsorship.to_settings(),
        );

        Ok(Self {
            pool,
            config: Arc::new(config),
            service: Arc::new(service),
            jwt: Arc::new(jwt),
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        // Development: allow any origin
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let sponsorship_routes = Router::new()
        // Purchases and pool
        .route("/purchases", post(purchases::purchase_codes))
        .route("/purchases/:id/usage", get(purchases::purchase_usage))
        .route("/codes/available", get(codes::available_codes))
        .route("/codes/stats", get(codes::pool_stats))
        .route("/codes/validate", post(codes::validate_code))
        .route("/codes/redeem", post(codes::redeem_code))
        .route("/codes/:code/deactivate", post(codes::deactivate_code))
        // Dealer invitations
        .route(
            "/dealer-invitations",
            post(invitations::create_dealer_invitation).get(invitations::list_dealer_invitations),
        )
        .route(
            "/dealer-invitations/accept",
            post(invitations::accept_dealer_invitation),
        )
        .route(
            "/dealer-invitations/:id/cancel",
            post(invitations::cancel_dealer_invitation),
        )
        .route(
            "/dealer-invitations/:id/resend",
            post(invitations::resend_dealer_invitation),
        )
        // Farmer invitations
        .route(
            "/farmer-invitations",
            post(invitations::create_farmer_invitation).get(invitations::list_farmer_invitations),
        )
        .route(
            "/farmer-invitations/bulk",
            post(invitations::bulk_create_farmer_invitations),
        )
        .route(
            "/farmer-invitations/accept",
            post(invitations::accept_farmer_invitation),
        )
        .route(
            "/farmer-invitations/:id/cancel",
            post(invitations::cancel_farmer_invitation),
        )
        .route(
            "/farmer-invitations/:id/resend",
            post(invitations::resend_farmer_invitation),
        )
        // Direct dealer transfers
        .route("/dealers/:dealer_id/transfer", post(dealers::transfer_codes))
        .route("/dealers/:dealer_id/reclaim", post(dealers::reclaim_codes));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .nest("/api/v1/sponsorship", sponsorship_routes)
        .merge(public_routes)
        // Global middleware (bottom layers run first)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.security.cors_origins))
        .layer(middleware::from_fn(trace_id))
        .with_state(state)
}
