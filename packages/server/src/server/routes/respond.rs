//! Customer respond links.
//!
//! The token is the whole credential: no session, no login. GET is
//! supported so the links in an SMS work from any phone browser; the same
//! handlers accept POST from richer clients.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::domains::confirmation::actions::{confirm, decline};
use crate::domains::scheduling::models::{Booking, Slot};
use crate::domains::waitlist::models::WaitlistEntry;
use crate::server::app::{ApiError, AppState};

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub booking: Booking,
    pub slot: Slot,
}

pub async fn respond_confirm_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let receipt = confirm(&state.deps, &token).await?;
    Ok(Json(ConfirmResponse {
        booking: receipt.booking,
        slot: receipt.slot,
    }))
}

#[derive(Serialize)]
pub struct DeclineResponse {
    pub cascade: CascadeView,
}

#[derive(Serialize)]
pub struct CascadeView {
    pub next_candidate: Option<WaitlistEntry>,
}

pub async fn respond_decline_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<DeclineResponse>, ApiError> {
    let receipt = decline(&state.deps, &token).await?;
    Ok(Json(DeclineResponse {
        cascade: CascadeView {
            next_candidate: receipt.next_candidate,
        },
    }))
}
