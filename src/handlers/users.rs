use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::geo::Coordinates;
use crate::models::{RoleProfile, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub location: Option<Coordinates>,
    #[serde(flatten)]
    pub profile: RoleProfile,
}

/// POST /api/users
/// Register a patient, hospital, or driver.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    if let Some(location) = request.location {
        if !location.in_range() {
            return Err(ApiError::validation("latitude/longitude out of range"));
        }
    }
    if let RoleProfile::Driver {
        linked_hospital_license,
    } = &request.profile
    {
        if linked_hospital_license.trim().is_empty() {
            return Err(ApiError::validation(
                "drivers must carry a linked hospital license",
            ));
        }
    }

    let mut user = User::new(request.name.trim(), request.profile);
    user.location = request.location;
    state.store.create_user(&user).await?;

    tracing::info!(user = %user.id, role = %user.role(), "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    state
        .store
        .user(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user not found"))
}
