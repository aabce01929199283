use crate::error::ApiError;
use crate::server::AppState;
use axum::Json;
use axum::extract::{Path, State};
use tandem_core::{LookupResponse, RegisterRequest, RegisterResponse, RoomId, TransportId};
use tracing::{debug, info, warn};

/// `GET /room/{id}`: current host of the room, `null` when unbound.
pub async fn lookup_room(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LookupResponse>, ApiError> {
    let room_id =
        RoomId::try_from(room_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let host_id = state.store.lookup(&room_id).await?;
    debug!("Lookup for room {}: {:?}", room_id, host_id);

    Ok(Json(LookupResponse { host_id }))
}

/// `POST /room/{id}` with `{ "id": <transport id> }`: claim the host role.
pub async fn register_room(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let room_id =
        RoomId::try_from(room_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let transport_id =
        TransportId::try_from(body.id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let success = state
        .registration_strategy
        .register(state.store.as_ref(), room_id.clone(), transport_id.clone())
        .await?;

    if success {
        info!("Room {} host registered: {}", room_id, transport_id);
    } else {
        warn!(
            "Room {} already has a host, registration of {} rejected",
            room_id, transport_id
        );
    }

    Ok(Json(RegisterResponse { success }))
}

/// `GET /health`.
pub async fn health() -> &'static str {
    "OK"
}
