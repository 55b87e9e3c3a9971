use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::common::SlotId;
use crate::domains::scheduling::actions::{
    cancel_slot, create_slot, hold_slot, open_slot, process_expired_holds, TickReport,
};
use crate::domains::scheduling::models::{NewSlot, Slot};
use crate::domains::waitlist::models::WaitlistEntry;
use crate::server::app::{actor_from_headers, tenant_from_headers, ApiError, AppState};

pub async fn create_slot_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewSlot>,
) -> Result<Json<Slot>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers);
    let slot = create_slot(&state.deps, tenant, input, actor).await?;
    Ok(Json(slot))
}

#[derive(Serialize)]
pub struct OpenSlotResponse {
    pub slot: Slot,
    pub candidates: Vec<CandidateView>,
    pub top_candidate: Option<WaitlistEntry>,
    pub notification_enqueued: bool,
}

#[derive(Serialize)]
pub struct CandidateView {
    pub entry_id: crate::common::EntryId,
    pub customer_name: String,
    pub match_score: i32,
}

pub async fn open_slot_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<SlotId>,
) -> Result<Json<OpenSlotResponse>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers);

    let outcome = open_slot(&state.deps, tenant, slot_id, actor).await?;

    Ok(Json(OpenSlotResponse {
        slot: outcome.slot,
        candidates: outcome
            .candidates
            .into_iter()
            .map(|c| CandidateView {
                entry_id: c.entry.id,
                customer_name: c.entry.customer_name,
                match_score: c.match_score,
            })
            .collect(),
        top_candidate: outcome.top_candidate,
        notification_enqueued: outcome.notification_enqueued,
    }))
}

#[derive(Deserialize, Default)]
pub struct HoldSlotRequest {
    pub ttl_minutes: Option<i64>,
}

pub async fn hold_slot_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<SlotId>,
    body: Option<Json<HoldSlotRequest>>,
) -> Result<Json<Slot>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers);
    let ttl = body.and_then(|Json(b)| b.ttl_minutes);

    let slot = hold_slot(&state.deps, tenant, slot_id, ttl, actor).await?;
    Ok(Json(slot))
}

pub async fn cancel_slot_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<SlotId>,
) -> Result<Json<Slot>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let actor = actor_from_headers(&headers);
    let slot = cancel_slot(&state.deps, tenant, slot_id, actor).await?;
    Ok(Json(slot))
}

/// Manual trigger for the expired-holds pass; the ticker runs the same code
/// on its own cadence.
pub async fn process_expired_holds_handler(
    State(state): State<AppState>,
) -> Result<Json<TickReport>, ApiError> {
    let report = process_expired_holds(&state.deps, 100).await?;
    Ok(Json(report))
}
