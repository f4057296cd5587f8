use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::DispatchOutcome;
use crate::documents;
use crate::emergency;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::models::{Emergency, PatientLocation, Role};
use crate::tracking::{self, PartySummary, TrackingView};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub location: PatientLocation,
    pub symptoms: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub emergency: Emergency,
    pub outcome: DispatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital: Option<PartySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<PartySummary>,
}

/// POST /api/emergencies
/// Trigger an emergency: score, match, persist. Responds 201 even when
/// dispatch degraded; the outcome code carries how far matching got.
pub async fn trigger_emergency(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<TriggerRequest>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    identity.require_role(Role::Patient)?;

    let result = emergency::trigger(
        &state.store,
        state.scorer.as_ref(),
        identity.id,
        request.location,
        request.symptoms,
    )
    .await?;

    // The intake report accompanies the case into the hospital feed.
    // Failure to attach it never fails the trigger.
    let has_symptoms = result
        .emergency
        .symptoms
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if has_symptoms {
        if let Err(err) =
            documents::attach_symptom_report(&state.store, state.blobs.as_ref(), &result.emergency)
                .await
        {
            tracing::warn!(emergency = %result.emergency.id, "failed to attach intake report: {err}");
        }
    }

    let summarize = |user: &crate::models::User| PartySummary {
        id: user.id,
        name: user.name.clone(),
        location: user.location,
    };
    Ok((
        StatusCode::CREATED,
        Json(TriggerResponse {
            hospital: result.hospital.as_ref().map(summarize),
            driver: result.driver.as_ref().map(summarize),
            emergency: result.emergency,
            outcome: result.outcome,
        }),
    ))
}

/// PUT /api/emergencies/:id/location
/// Patient corrects their reported position mid-emergency.
pub async fn update_patient_location(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(location): Json<PatientLocation>,
) -> Result<Json<Emergency>, ApiError> {
    identity.require_role(Role::Patient)?;
    let emergency =
        emergency::update_patient_location(&state.store, identity.id, id, location).await?;
    Ok(Json(emergency))
}

/// GET /api/emergencies/:id/tracking
/// Shared polling view for all three roles, served read-through from the
/// tracking cache.
pub async fn get_tracking(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingView>, ApiError> {
    let view = tracking::get_tracking(&state.store, &state.tracking, identity, id).await?;
    Ok(Json(view))
}
