use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::emergency;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::models::{DriverAction, Emergency, Role};
use crate::telemetry::{self, LocationReport};
use crate::AppState;

/// GET /api/driver/assignment
/// The driver's current non-completed assignment; 204 when idle.
pub async fn driver_assignment(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Response, ApiError> {
    identity.require_role(Role::Driver)?;
    match state.store.driver_active_emergency(identity.id).await? {
        Some(emergency) => Ok(Json(emergency).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct DriverLocationRequest {
    pub lat: f64,
    pub lng: f64,
}

/// POST /api/emergencies/:id/driver-location
/// Position ping from the ambulance. The response always carries freshly
/// computed distance, ETA, and derived status, whether or not the ping
/// was persisted.
pub async fn driver_location(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<DriverLocationRequest>,
) -> Result<Json<LocationReport>, ApiError> {
    identity.require_role(Role::Driver)?;
    let report = telemetry::report_driver_location(
        &state.store,
        identity.id,
        id,
        request.lat,
        request.lng,
    )
    .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct DriverActionRequest {
    pub action: DriverAction,
}

/// POST /api/emergencies/:id/driver-action
/// Explicit lifecycle transition: patient loaded, arrived at hospital,
/// handover complete.
pub async fn driver_action(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<DriverActionRequest>,
) -> Result<Json<Emergency>, ApiError> {
    identity.require_role(Role::Driver)?;
    let emergency =
        emergency::apply_driver_action(&state.store, identity.id, id, request.action).await?;
    Ok(Json(emergency))
}
