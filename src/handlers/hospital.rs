use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::emergency;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::models::{BedCounts, Emergency, EmergencyStatus, Role, RoleProfile, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub status: Option<EmergencyStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /api/hospital/feed
/// Active cases assigned to the requesting hospital, windowed by document
/// lifetime and deduplicated to the latest case per patient.
pub async fn hospital_feed(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<Emergency>>, ApiError> {
    identity.require_role(Role::Hospital)?;
    let limit = query.limit.unwrap_or(20).min(100);
    let feed = emergency::hospital_feed(
        &state.store,
        identity.id,
        query.status,
        limit,
        query.offset.unwrap_or(0),
    )
    .await?;
    Ok(Json(feed))
}

/// POST /api/emergencies/:id/accept
/// Hospital claims the case. Idempotent; a completed case is echoed back.
pub async fn accept_case(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Emergency>, ApiError> {
    identity.require_role(Role::Hospital)?;
    let emergency = emergency::accept_case(&state.store, identity.id, id).await?;
    Ok(Json(emergency))
}

/// PUT /api/hospital/beds
/// Replace the hospital's advertised bed availability.
pub async fn update_beds(
    State(state): State<AppState>,
    identity: Identity,
    Json(counts): Json<BedCounts>,
) -> Result<Json<User>, ApiError> {
    identity.require_role(Role::Hospital)?;
    let mut hospital = state
        .store
        .user(identity.id)
        .await?
        .filter(|u| u.role() == Role::Hospital)
        .ok_or_else(|| ApiError::not_found("hospital is not registered"))?;

    if let RoleProfile::Hospital { bed_counts, .. } = &mut hospital.profile {
        *bed_counts = Some(counts);
    }
    state.store.update_user(&hospital).await?;
    Ok(Json(hospital))
}
