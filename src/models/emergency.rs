use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;
use crate::severity::SeverityTier;

/// Lifecycle states of an emergency. Status never regresses along
/// `pending < assigned < en_route < arrived < completed`, with one
/// deliberate exception: `en_route` and `arrived` may alternate while the
/// navigation target changes mid-transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Pending,
    Assigned,
    EnRoute,
    Arrived,
    Completed,
}

impl EmergencyStatus {
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Assigned => 1,
            Self::EnRoute => 2,
            Self::Arrived => 3,
            Self::Completed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }

    /// Whether moving to `next` is a legal transition. The only permitted
    /// step backwards is `arrived -> en_route` during transit.
    pub fn can_become(self, next: EmergencyStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self == Self::Arrived && next == Self::EnRoute {
            return true;
        }
        next.rank() >= self.rank()
    }
}

/// Which leg of the trip the ambulance is on. Persisted on the aggregate so
/// a driver reconnecting mid-trip can recover the leg from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitPhase {
    ToPatient,
    ToHospital,
}

/// Explicit driver lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverAction {
    PatientLoaded,
    ArrivedHospital,
    HandoverComplete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PatientLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// The central aggregate. Created and status-mutated only by the emergency
/// lifecycle operations; read by all three roles subject to the
/// participant predicate. Never deleted while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emergency {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: EmergencyStatus,
    pub location: PatientLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<String>,
    pub severity_score: u8,
    pub severity_tier: SeverityTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_assessment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_hospital_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_driver_id: Option<Uuid>,
    pub phase: TransitPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_location: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_last_location_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    pub triggered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrived_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        use EmergencyStatus::*;
        assert!(Pending.rank() < Assigned.rank());
        assert!(Assigned.rank() < EnRoute.rank());
        assert!(EnRoute.rank() < Arrived.rank());
        assert!(Arrived.rank() < Completed.rank());
    }

    #[test]
    fn test_completed_is_terminal() {
        use EmergencyStatus::*;
        for next in [Pending, Assigned, EnRoute, Arrived, Completed] {
            assert!(!Completed.can_become(next));
        }
    }

    #[test]
    fn test_arrived_may_fall_back_to_en_route() {
        use EmergencyStatus::*;
        assert!(Arrived.can_become(EnRoute));
        assert!(EnRoute.can_become(Arrived));
        assert!(!EnRoute.can_become(Assigned));
        assert!(!Assigned.can_become(Pending));
    }

    #[test]
    fn test_status_wire_names() {
        let s = serde_json::to_string(&EmergencyStatus::EnRoute).unwrap();
        assert_eq!(s, "\"en_route\"");
        let s = serde_json::to_string(&DriverAction::HandoverComplete).unwrap();
        assert_eq!(s, "\"handover_complete\"");
    }
}
