use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::common::EntryId;
use crate::domains::audit::models::Actor;
use crate::domains::waitlist::actions::{join_waitlist, remove_entry};
use crate::domains::waitlist::models::{NewEntry, WaitlistEntry};
use crate::server::app::{tenant_from_headers, ApiError, AppState};

pub async fn join_waitlist_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewEntry>,
) -> Result<Json<WaitlistEntry>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let entry = join_waitlist(&state.deps, tenant, input).await?;
    Ok(Json(entry))
}

pub async fn remove_entry_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(entry_id): Path<EntryId>,
) -> Result<Json<WaitlistEntry>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let entry = remove_entry(
        &state.deps,
        tenant,
        entry_id,
        Actor::customer(Some(entry_id.into_uuid())),
    )
    .await?;
    Ok(Json(entry))
}
