use chrono::{Duration, Utc};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use crate::error::ApiError;
use crate::geo::{self, Coordinates};
use crate::models::{EmergencyStatus, TransitPhase};
use crate::store::Store;

/// Radius around the current navigation target that counts as "nearing".
pub const NEARING_RADIUS_KM: f64 = 1.0;

/// Server-side write suppression: a report is not persisted when the
/// previous write is younger than this...
const MIN_WRITE_INTERVAL_SECS: i64 = 4;
/// ...the position moved less than this...
const MIN_WRITE_MOVE_METERS: f64 = 20.0;

/// Client-side pre-filter: minimum seconds between sent reports...
const GATE_INTERVAL_SECS: u64 = 5;
/// ...unless the position moved more than about 15 m in either axis.
const GATE_DELTA_DEG: f64 = 0.00015;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    pub nearing_target: bool,
    pub status: EmergencyStatus,
    /// Whether this report was written to storage or only computed.
    #[serde(skip)]
    pub persisted: bool,
}

/// Ingests one driver position ping: validates, recomputes distance and
/// ETA against the current navigation target, derives `en_route` vs
/// `arrived`, and persists unless the write-suppression rule applies.
/// Callers always get freshly computed numbers, persisted or not.
pub async fn report_driver_location(
    store: &Store,
    driver_id: Uuid,
    emergency_id: Uuid,
    lat: f64,
    lng: f64,
) -> Result<LocationReport, ApiError> {
    let position = Coordinates::new(lat, lng);
    if !position.in_range() {
        return Err(ApiError::validation("latitude/longitude out of range"));
    }

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
        // Acknowledge with the terminal state, mutate nothing.
        return Ok(LocationReport {
            distance_km: emergency.distance_km,
            eta_minutes: emergency.eta_minutes,
            nearing_target: false,
            status: emergency.status,
            persisted: false,
        });
    }

    let target = match emergency.phase {
        TransitPhase::ToPatient => Some(emergency.location.coordinates()),
        TransitPhase::ToHospital => match emergency.assigned_hospital_id {
            Some(hospital_id) => store.user(hospital_id).await?.and_then(|h| h.location),
            None => None,
        },
    };

    let raw_distance = target.map(|t| geo::distance_km_raw(position, t));
    let distance_km = target.map(|t| geo::distance_km(position, t));
    let eta_minutes = distance_km.map(geo::eta_minutes);
    let nearing_target = raw_distance.is_some_and(|d| d < NEARING_RADIUS_KM);

    // Without a known target position the leg cannot be classified as
    // arrived, so the status stays en_route.
    let derived = if nearing_target {
        EmergencyStatus::Arrived
    } else {
        EmergencyStatus::EnRoute
    };
    let next_status = if emergency.status.can_become(derived) {
        derived
    } else {
        emergency.status
    };

    let now = Utc::now();
    let suppress = match (emergency.driver_last_location_update, emergency.driver_location) {
        (Some(last_write), Some(last_position)) => {
            now - last_write < Duration::seconds(MIN_WRITE_INTERVAL_SECS)
                && geo::distance_m(last_position, position) < MIN_WRITE_MOVE_METERS
                && next_status == emergency.status
        }
        _ => false,
    };
    if suppress {
        return Ok(LocationReport {
            distance_km,
            eta_minutes,
            nearing_target,
            status: emergency.status,
            persisted: false,
        });
    }

    let newly_arrived = next_status == EmergencyStatus::Arrived
        && emergency.status != EmergencyStatus::Arrived;
    emergency.driver_location = Some(position);
    emergency.driver_last_location_update = Some(now);
    emergency.distance_km = distance_km;
    emergency.eta_minutes = eta_minutes;
    emergency.status = next_status;
    if newly_arrived && emergency.arrived_at.is_none() {
        emergency.arrived_at = Some(now);
    }
    store.update_emergency(&emergency).await?;

    // Keep the driver's own record current so future dispatches rank on a
    // recent position. Write failures here must not fail the report.
    if let Ok(Some(mut driver)) = store.user(driver_id).await {
        driver.location = Some(position);
        driver.last_location_update = Some(now);
        if let Err(err) = store.update_user(&driver).await {
            tracing::warn!(driver = %driver_id, "failed to update driver position: {err:#}");
        }
    }

    Ok(LocationReport {
        distance_km,
        eta_minutes,
        nearing_target,
        status: next_status,
        persisted: true,
    })
}

/// Client-side throttle layered in front of the server: suppress a report
/// unless enough time passed or the position moved appreciably. Lives
/// here so both dashboard watchers share one implementation.
#[derive(Debug, Default)]
pub struct ReportGate {
    last_sent: Option<(Instant, Coordinates)>,
}

impl ReportGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_send(&mut self, position: Coordinates, now: Instant) -> bool {
        let send = match self.last_sent {
            None => true,
            Some((at, last)) => {
                now.duration_since(at).as_secs() >= GATE_INTERVAL_SECS
                    || (position.lat - last.lat).abs() > GATE_DELTA_DEG
                    || (position.lng - last.lng).abs() > GATE_DELTA_DEG
            }
        };
        if send {
            self.last_sent = Some((now, position));
        }
        send
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientLocation, RoleProfile, User};
    use crate::severity::KeywordScorer;
    use std::time::Duration as StdDuration;

    async fn dispatched(store: &Store) -> (Uuid, Uuid) {
        let patient = User::new("p", RoleProfile::Patient);
        store.create_user(&patient).await.unwrap();
        let mut hospital = User::new(
            "h",
            RoleProfile::Hospital {
                license_number: Some("H1".to_string()),
                bed_counts: None,
            },
        );
        hospital.location = Some(Coordinates::new(28.61, 77.21));
        store.create_user(&hospital).await.unwrap();
        let mut driver = User::new(
            "d",
            RoleProfile::Driver {
                linked_hospital_license: "H1".to_string(),
            },
        );
        driver.location = Some(Coordinates::new(28.70, 77.30));
        store.create_user(&driver).await.unwrap();

        let result = crate::emergency::trigger(
            store,
            &KeywordScorer,
            patient.id,
            PatientLocation {
                lat: 28.60,
                lng: 77.20,
                address: None,
            },
            None,
        )
        .await
        .unwrap();
        (driver.id, result.emergency.id)
    }

    #[tokio::test]
    async fn test_far_report_stays_en_route() {
        let store = Store::memory();
        let (driver_id, emergency_id) = dispatched(&store).await;
        let report = report_driver_location(&store, driver_id, emergency_id, 28.70, 77.30)
            .await
            .unwrap();
        assert!(!report.nearing_target);
        assert_eq!(report.status, EmergencyStatus::EnRoute);
        assert!(report.persisted);
        assert!(report.distance_km.unwrap() > NEARING_RADIUS_KM);
    }

    #[tokio::test]
    async fn test_nearing_patient_persists_arrived() {
        let store = Store::memory();
        let (driver_id, emergency_id) = dispatched(&store).await;
        // ~0.5 km from the patient.
        let report = report_driver_location(&store, driver_id, emergency_id, 28.6045, 77.20)
            .await
            .unwrap();
        assert!(report.nearing_target);
        assert_eq!(report.status, EmergencyStatus::Arrived);
        let stored = store.emergency(emergency_id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmergencyStatus::Arrived);
        assert!(stored.arrived_at.is_some());
    }

    #[tokio::test]
    async fn test_phase_flip_toggles_back_to_en_route() {
        let store = Store::memory();
        let (driver_id, emergency_id) = dispatched(&store).await;
        report_driver_location(&store, driver_id, emergency_id, 28.6045, 77.20)
            .await
            .unwrap();

        // Patient loaded: target switches to the hospital while the
        // ambulance is still at the pickup point.
        crate::emergency::apply_driver_action(
            &store,
            driver_id,
            emergency_id,
            crate::models::DriverAction::PatientLoaded,
        )
        .await
        .unwrap();

        // Force the next report past the write-suppression window.
        let mut e = store.emergency(emergency_id).await.unwrap().unwrap();
        e.driver_last_location_update = Some(Utc::now() - Duration::seconds(10));
        store.update_emergency(&e).await.unwrap();

        let report = report_driver_location(&store, driver_id, emergency_id, 28.6045, 77.20)
            .await
            .unwrap();
        assert!(!report.nearing_target);
        assert_eq!(report.status, EmergencyStatus::EnRoute);
    }

    #[tokio::test]
    async fn test_write_suppression() {
        let store = Store::memory();
        let (driver_id, emergency_id) = dispatched(&store).await;
        let first = report_driver_location(&store, driver_id, emergency_id, 28.70, 77.30)
            .await
            .unwrap();
        assert!(first.persisted);
        let stamp = store
            .emergency(emergency_id)
            .await
            .unwrap()
            .unwrap()
            .driver_last_location_update;

        // Immediately afterwards, ~5 m away, same derived status: computed
        // but not written.
        let second = report_driver_location(&store, driver_id, emergency_id, 28.70004, 77.30)
            .await
            .unwrap();
        assert!(!second.persisted);
        assert!(second.distance_km.is_some());
        let unchanged = store
            .emergency(emergency_id)
            .await
            .unwrap()
            .unwrap()
            .driver_last_location_update;
        assert_eq!(stamp, unchanged);

        // Backdate the last write: age alone forces the next write
        // regardless of distance.
        let mut e = store.emergency(emergency_id).await.unwrap().unwrap();
        e.driver_last_location_update = Some(Utc::now() - Duration::seconds(10));
        store.update_emergency(&e).await.unwrap();
        let third = report_driver_location(&store, driver_id, emergency_id, 28.70004, 77.30)
            .await
            .unwrap();
        assert!(third.persisted);
    }

    #[tokio::test]
    async fn test_status_change_defeats_suppression() {
        let store = Store::memory();
        let (driver_id, emergency_id) = dispatched(&store).await;
        report_driver_location(&store, driver_id, emergency_id, 28.70, 77.30)
            .await
            .unwrap();
        // Seconds later but now within the nearing radius: the derived
        // status changes, so the write goes through.
        let report = report_driver_location(&store, driver_id, emergency_id, 28.6045, 77.20)
            .await
            .unwrap();
        assert!(report.persisted);
        assert_eq!(report.status, EmergencyStatus::Arrived);
    }

    #[tokio::test]
    async fn test_completed_report_is_acknowledged_noop() {
        let store = Store::memory();
        let (driver_id, emergency_id) = dispatched(&store).await;
        crate::emergency::apply_driver_action(
            &store,
            driver_id,
            emergency_id,
            crate::models::DriverAction::HandoverComplete,
        )
        .await
        .unwrap();

        let before = store.emergency(emergency_id).await.unwrap().unwrap();
        let report = report_driver_location(&store, driver_id, emergency_id, 28.61, 77.21)
            .await
            .unwrap();
        assert_eq!(report.status, EmergencyStatus::Completed);
        assert!(!report.persisted);
        let after = store.emergency(emergency_id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_out_of_range_rejected_before_lookup() {
        let store = Store::memory();
        let err = report_driver_location(&store, Uuid::new_v4(), Uuid::new_v4(), 91.0, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_report_gate() {
        let mut gate = ReportGate::new();
        let start = Instant::now();
        let here = Coordinates::new(28.60, 77.20);

        assert!(gate.should_send(here, start));
        // Within 5 s and under the movement threshold: suppressed.
        assert!(!gate.should_send(
            Coordinates::new(28.60005, 77.20),
            start + StdDuration::from_secs(1)
        ));
        // Large enough movement goes through regardless of elapsed time.
        assert!(gate.should_send(
            Coordinates::new(28.6003, 77.20),
            start + StdDuration::from_secs(2)
        ));
        // Time alone is also sufficient.
        assert!(gate.should_send(
            Coordinates::new(28.6003, 77.20),
            start + StdDuration::from_secs(8)
        ));
    }
}
