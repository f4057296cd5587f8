use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::dispatch::{self, DispatchDecision, DispatchOutcome, HospitalChoice, NoAmbulanceReason};
use crate::error::ApiError;
use crate::models::{
    DriverAction, Emergency, EmergencyStatus, PatientLocation, Role, RoleProfile, TransitPhase,
    User,
};
use crate::severity::{self, SeverityScorer};
use crate::store::Store;

/// How long a documentless case stays in the hospital feed after trigger.
pub const FEED_WINDOW_MINUTES: i64 = 60;

/// Upper bound on how many recent cases the feed query scans before the
/// visibility window and dedupe are applied.
const FEED_SCAN_LIMIT: u32 = 200;

/// Whether `user_id` acting as `role` is party to this emergency: the
/// owning patient, the currently assigned hospital, or the currently
/// assigned driver. Shared by tracking reads and document views.
pub fn is_participant(emergency: &Emergency, user_id: Uuid, role: Role) -> bool {
    match role {
        Role::Patient => emergency.patient_id == user_id,
        Role::Hospital => emergency.assigned_hospital_id == Some(user_id),
        Role::Driver => emergency.assigned_driver_id == Some(user_id),
    }
}

#[derive(Debug)]
pub struct TriggerResult {
    pub emergency: Emergency,
    pub outcome: DispatchOutcome,
    pub hospital: Option<User>,
    pub driver: Option<User>,
}

/// Creates an emergency: scores symptoms best-effort, runs the dispatch
/// matcher, persists whichever of hospital/driver were found. The record
/// is created even when dispatch degrades — the outcome code tells the
/// caller exactly how far matching got.
pub async fn trigger(
    store: &Store,
    scorer: &dyn SeverityScorer,
    patient_id: Uuid,
    location: PatientLocation,
    symptoms: Option<String>,
) -> Result<TriggerResult, ApiError> {
    let coords = location.coordinates();
    if !coords.in_range() {
        return Err(ApiError::validation("latitude/longitude out of range"));
    }
    let patient = store
        .user(patient_id)
        .await?
        .filter(|u| u.role() == Role::Patient)
        .ok_or_else(|| ApiError::not_found("patient is not registered"))?;

    let assessment = severity::assess_or_fallback(scorer, symptoms.as_deref());

    let hospitals = store.active_hospitals().await?;
    let decision = match dispatch::choose_hospital(coords, &hospitals) {
        HospitalChoice::NoHospitals => DispatchDecision::NoHospitals,
        HospitalChoice::Unranked(hospital) => DispatchDecision::HospitalOnly {
            hospital,
            reason: NoAmbulanceReason::HospitalUnranked,
        },
        HospitalChoice::NearestUnlicensed(hospital) => DispatchDecision::HospitalOnly {
            hospital,
            reason: NoAmbulanceReason::HospitalUnlicensed,
        },
        HospitalChoice::Nearest { hospital, license } => {
            let drivers = store.active_drivers_with_license(&license).await?;
            match dispatch::choose_driver(coords, drivers) {
                Some(choice) => DispatchDecision::Dispatched {
                    hospital,
                    driver: choice.driver,
                    distance_km: choice.distance_km,
                    eta_minutes: choice.eta_minutes,
                },
                None => DispatchDecision::HospitalOnly {
                    hospital,
                    reason: NoAmbulanceReason::NoCompatibleDriver,
                },
            }
        }
    };

    let outcome = decision.outcome();
    let (hospital, driver, distance_km, eta_minutes) = match decision {
        DispatchDecision::Dispatched {
            hospital,
            driver,
            distance_km,
            eta_minutes,
        } => (Some(hospital), Some(driver), distance_km, eta_minutes),
        DispatchDecision::HospitalOnly { hospital, .. } => (Some(hospital), None, None, None),
        DispatchDecision::NoHospitals => (None, None, None, None),
    };

    let now = Utc::now();
    let emergency = Emergency {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        status: if hospital.is_some() {
            EmergencyStatus::Assigned
        } else {
            EmergencyStatus::Pending
        },
        location,
        symptoms,
        severity_score: assessment.score,
        severity_tier: assessment.tier,
        ai_assessment: Some(assessment.advice),
        assigned_hospital_id: hospital.as_ref().map(|h| h.id),
        assigned_driver_id: driver.as_ref().map(|d| d.id),
        phase: TransitPhase::ToPatient,
        driver_location: driver.as_ref().and_then(|d| d.location),
        driver_last_location_update: None,
        distance_km,
        eta_minutes,
        triggered_at: now,
        accepted_at: None,
        arrived_at: None,
        completed_at: None,
    };
    store.create_emergency(&emergency).await?;

    tracing::info!(
        emergency = %emergency.id,
        patient = %patient.id,
        ?outcome,
        "emergency triggered"
    );

    Ok(TriggerResult {
        emergency,
        outcome,
        hospital,
        driver,
    })
}

/// Idempotent hospital claim. A hospital may claim an unassigned or
/// differently-assigned case; if the previously assigned driver is not
/// compatible with the new hospital's license, the driver assignment is
/// cleared so the license invariant holds.
pub async fn accept_case(
    store: &Store,
    hospital_id: Uuid,
    emergency_id: Uuid,
) -> Result<Emergency, ApiError> {
    let hospital = store
        .user(hospital_id)
        .await?
        .filter(|u| u.role() == Role::Hospital)
        .ok_or_else(|| ApiError::not_found("hospital is not registered"))?;
    let mut emergency = store
        .emergency(emergency_id)
        .await?
        .ok_or_else(|| ApiError::not_found("emergency not found"))?;

    if emergency.status.is_terminal() {
        return Ok(emergency);
    }

    emergency.assigned_hospital_id = Some(hospital.id);
    emergency.accepted_at = Some(Utc::now());
    if emergency.status == EmergencyStatus::Pending {
        emergency.status = EmergencyStatus::Assigned;
    }

    if let Some(driver_id) = emergency.assigned_driver_id {
        let compatible = match (store.user(driver_id).await?, &hospital.profile) {
            (
                Some(driver),
                RoleProfile::Hospital {
                    license_number: Some(license),
                    ..
                },
            ) => driver.license_number() == Some(license.as_str()),
            _ => false,
        };
        if !compatible {
            tracing::info!(
                emergency = %emergency.id,
                driver = %driver_id,
                hospital = %hospital.id,
                "clearing driver assignment incompatible with accepting hospital"
            );
            emergency.assigned_driver_id = None;
        }
    }

    store.update_emergency(&emergency).await?;
    Ok(emergency)
}

/// Explicit driver lifecycle actions. Against a completed emergency every
/// action is a no-op acknowledged with the terminal state.
pub async fn apply_driver_action(
    store: &Store,
    driver_id: Uuid,
    emergency_id: Uuid,
    action: DriverAction,
) -> Result<Emergency, ApiError> {
    let mut emergency = store
        .emergency(emergency_id)
        .await?
        .ok_or_else(|| ApiError::not_found("emergency not found"))?;
    if emergency.assigned_driver_id != Some(driver_id) {
        return Err(ApiError::forbidden(
            "driver is not assigned to this emergency",
        ));
    }
    if emergency.status.is_terminal() {
        return Ok(emergency);
    }

    let now = Utc::now();
    match action {
        DriverAction::PatientLoaded => {
            emergency.phase = TransitPhase::ToHospital;
            if emergency.status.can_become(EmergencyStatus::EnRoute) {
                emergency.status = EmergencyStatus::EnRoute;
            }
        }
        DriverAction::ArrivedHospital => {
            emergency.status = EmergencyStatus::Arrived;
            emergency.arrived_at = Some(now);
        }
        DriverAction::HandoverComplete => {
            emergency.status = EmergencyStatus::Completed;
            emergency.completed_at = Some(now);
        }
    }

    store.update_emergency(&emergency).await?;
    tracing::info!(emergency = %emergency.id, ?action, status = ?emergency.status, "driver action applied");
    Ok(emergency)
}

/// Overwrites the patient-reported location. Once the emergency is
/// completed this is a no-op that echoes the terminal state.
pub async fn update_patient_location(
    store: &Store,
    patient_id: Uuid,
    emergency_id: Uuid,
    location: PatientLocation,
) -> Result<Emergency, ApiError> {
    if !location.coordinates().in_range() {
        return Err(ApiError::validation("latitude/longitude out of range"));
    }
    let mut emergency = store
        .emergency(emergency_id)
        .await?
        .ok_or_else(|| ApiError::not_found("emergency not found"))?;
    if emergency.patient_id != patient_id {
        return Err(ApiError::forbidden("not your emergency"));
    }
    if emergency.status.is_terminal() {
        return Ok(emergency);
    }

    emergency.location = location;
    store.update_emergency(&emergency).await?;
    Ok(emergency)
}

/// The hospital's active feed. An emergency is visible while it has at
/// least one unexpired document, or has no documents at all and was
/// triggered within the last hour. The feed shows only the most recent
/// case per patient.
pub async fn hospital_feed(
    store: &Store,
    hospital_id: Uuid,
    status_filter: Option<EmergencyStatus>,
    limit: u32,
    offset: u32,
) -> Result<Vec<Emergency>, ApiError> {
    let now = Utc::now();
    let window_start = now - Duration::minutes(FEED_WINDOW_MINUTES);
    let candidates = store
        .hospital_emergencies(hospital_id, FEED_SCAN_LIMIT)
        .await?;

    let mut seen_patients = std::collections::HashSet::new();
    let mut visible = Vec::new();
    for emergency in candidates {
        if let Some(filter) = status_filter {
            if emergency.status != filter {
                continue;
            }
        }
        // Candidates arrive most-recent-first, so the first case per
        // patient is the one the feed keeps.
        if !seen_patients.insert(emergency.patient_id) {
            continue;
        }
        let documents = store.emergency_documents(emergency.id).await?;
        let has_live_document = documents.iter().any(|d| !d.is_expired(now));
        let fresh_and_undocumented = documents.is_empty() && emergency.triggered_at > window_start;
        if has_live_document || fresh_and_undocumented {
            visible.push(emergency);
        }
    }

    Ok(visible
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect())
}
