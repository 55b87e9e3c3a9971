//! Application setup and router assembly.
//!
//! The HTTP edge is deliberately thin: handlers parse the request, resolve
//! the tenant, and call a domain action. Authentication and tenant
//! onboarding live in the gateway in front of this service; the edge trusts
//! the `x-tenant-id` header that gateway injects.

use std::time::Duration;

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::common::{CoreError, TenantId};
use crate::domains::audit::models::Actor;
use crate::kernel::deps::EngineDeps;
use crate::server::routes::{
    cancel_slot_handler, create_slot_handler, health_handler, hold_slot_handler,
    join_waitlist_handler, open_slot_handler, process_expired_holds_handler,
    remove_entry_handler, respond_confirm_handler, respond_decline_handler,
};

/// Shared state for every route handler.
#[derive(Clone)]
pub struct AppState {
    pub deps: EngineDeps,
    pub db_pool: PgPool,
}

/// Build the application router
pub fn build_app(deps: EngineDeps, db_pool: PgPool) -> Router {
    let state = AppState { deps, db_pool };

    Router::new()
        .route("/health", get(health_handler))
        // Admin surface (gateway-authenticated)
        .route("/v1/slots", post(create_slot_handler))
        .route("/v1/slots/:id/open", post(open_slot_handler))
        .route("/v1/slots/:id/hold", post(hold_slot_handler))
        .route("/v1/slots/:id/cancel", post(cancel_slot_handler))
        .route("/v1/waitlist", post(join_waitlist_handler))
        .route(
            "/v1/waitlist/:id",
            axum::routing::delete(remove_entry_handler),
        )
        .route(
            "/v1/maintenance/expired-holds",
            post(process_expired_holds_handler),
        )
        // Customer respond links (token-authenticated; GET so SMS links work)
        .route(
            "/r/confirm/:token",
            get(respond_confirm_handler).post(respond_confirm_handler),
        )
        .route(
            "/r/decline/:token",
            get(respond_decline_handler).post(respond_decline_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

// =============================================================================
// Tenant / actor extraction
// =============================================================================

/// Resolve the caller's tenant from the gateway-injected header.
pub fn tenant_from_headers(headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let raw = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(CoreError::InvalidToken("missing x-tenant-id".into())))?;
    TenantId::parse(raw)
        .map_err(|_| ApiError(CoreError::InvalidToken("malformed x-tenant-id".into())))
}

/// Staff identity when the gateway forwarded one; system otherwise.
pub fn actor_from_headers(headers: &HeaderMap) -> Actor {
    headers
        .get("x-staff-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .map(Actor::staff)
        .unwrap_or_else(Actor::system)
}

// =============================================================================
// Error mapping
// =============================================================================

/// Wraps `CoreError` so the stable kind (and precondition sub-kind) reaches
/// API consumers unchanged.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use axum::http::StatusCode;

        let status = match &self.0 {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            CoreError::PreconditionFailed(_) => StatusCode::CONFLICT,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::InvariantViolated(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let reason = match &self.0 {
            CoreError::PreconditionFailed(p) => Some(p.as_str()),
            _ => None,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.0.kind(),
            "reason": reason,
            "detail": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}
