use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::emergency::is_participant;
use crate::error::ApiError;
use crate::geo::Coordinates;
use crate::identity::Identity;
use crate::models::{Emergency, EmergencyStatus, PatientLocation, Role, TransitPhase};
use crate::severity::SeverityTier;
use crate::store::Store;

/// How long a cached tracking payload is served unconditionally. Short
/// enough that polling dashboards see near-real-time data, long enough to
/// absorb bursts from three clients polling independently.
pub const TRACKING_TTL: Duration = Duration::from_secs(2);

/// Maximum age of a cache entry that may still be served, marked stale,
/// when the authoritative read fails.
pub const STALE_GRACE: Duration = Duration::from_secs(30);

/// Cache key: requester role + requester id + emergency. Including the
/// requester prevents one tenant's view being served to another.
pub type TrackingKey = (Role, Uuid, Uuid);

pub type TrackingCache = TtlCache<TrackingKey, TrackingView>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub emergency_id: Uuid,
    pub status: EmergencyStatus,
    pub phase: TransitPhase,
    pub patient_location: PatientLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambulance_location: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital: Option<PartySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<PartySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    pub severity_score: u8,
    pub severity_tier: SeverityTier,
    /// Set when this payload was served from cache past its TTL because
    /// the authoritative read failed.
    pub stale: bool,
}

async fn assemble(store: &Store, emergency: &Emergency) -> Result<TrackingView> {
    let hospital = match emergency.assigned_hospital_id {
        Some(id) => store.user(id).await?.map(|h| PartySummary {
            id: h.id,
            name: h.name,
            location: h.location,
        }),
        None => None,
    };
    let driver = match emergency.assigned_driver_id {
        Some(id) => store.user(id).await?.map(|d| PartySummary {
            id: d.id,
            name: d.name,
            location: d.location,
        }),
        None => None,
    };
    Ok(TrackingView {
        emergency_id: emergency.id,
        status: emergency.status,
        phase: emergency.phase,
        patient_location: emergency.location.clone(),
        ambulance_location: emergency.driver_location,
        hospital,
        driver,
        distance_km: emergency.distance_km,
        eta_minutes: emergency.eta_minutes,
        severity_score: emergency.severity_score,
        severity_tier: emergency.severity_tier,
        stale: false,
    })
}

/// Read-through tracking view shared by all three polling dashboards.
///
/// Not-found and permission failures always propagate; only storage
/// failures fall back to a recent stale entry, because a stale map marker
/// is far less harmful than a dashboard crash mid-emergency.
pub async fn get_tracking(
    store: &Store,
    cache: &TrackingCache,
    identity: Identity,
    emergency_id: Uuid,
) -> Result<TrackingView, ApiError> {
    let key: TrackingKey = (identity.role, identity.id, emergency_id);
    if let Some(view) = cache.get(&key) {
        return Ok(view);
    }

    let emergency = match store.emergency(emergency_id).await {
        Ok(Some(emergency)) => emergency,
        Ok(None) => return Err(ApiError::not_found("emergency not found")),
        Err(err) => return degraded(cache, &key, err),
    };
    if !is_participant(&emergency, identity.id, identity.role) {
        return Err(ApiError::forbidden("not a participant in this emergency"));
    }

    match assemble(store, &emergency).await {
        Ok(view) => {
            cache.insert(key, view.clone(), TRACKING_TTL);
            Ok(view)
        }
        Err(err) => degraded(cache, &key, err),
    }
}

fn degraded(
    cache: &TrackingCache,
    key: &TrackingKey,
    err: anyhow::Error,
) -> Result<TrackingView, ApiError> {
    if let Some(mut view) = cache.get_if_fresher_than(key, STALE_GRACE) {
        tracing::warn!(emergency = %key.2, "serving stale tracking view: {err:#}");
        view.stale = true;
        return Ok(view);
    }
    Err(ApiError::Internal(err))
}
