use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{self, Coordinates};
use crate::models::{RoleProfile, User};

/// Machine-readable result of a dispatch attempt, returned alongside the
/// created emergency so callers can tell the degraded outcomes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Dispatched,
    HospitalOnlyNoLicense,
    HospitalOnlyNoDriver,
    NoHospitalsAvailable,
}

/// Why no ambulance was assigned even though a hospital was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoAmbulanceReason {
    /// The winning hospital has no license number on file, so driver
    /// compatibility cannot be established and no search was attempted.
    HospitalUnlicensed,
    /// The hospital was assigned without distance ranking because no
    /// hospital had a location; no ambulance search was attempted.
    HospitalUnranked,
    /// Compatible drivers were searched, none found.
    NoCompatibleDriver,
}

#[derive(Debug, Clone)]
pub enum DispatchDecision {
    Dispatched {
        hospital: User,
        driver: User,
        /// Provisional figures from the driver's last known location.
        /// Null when the driver has no location on file.
        distance_km: Option<f64>,
        eta_minutes: Option<u32>,
    },
    HospitalOnly {
        hospital: User,
        reason: NoAmbulanceReason,
    },
    NoHospitals,
}

impl DispatchDecision {
    pub fn outcome(&self) -> DispatchOutcome {
        match self {
            Self::Dispatched { .. } => DispatchOutcome::Dispatched,
            Self::HospitalOnly { reason, .. } => match reason {
                NoAmbulanceReason::HospitalUnlicensed => DispatchOutcome::HospitalOnlyNoLicense,
                NoAmbulanceReason::HospitalUnranked | NoAmbulanceReason::NoCompatibleDriver => {
                    DispatchOutcome::HospitalOnlyNoDriver
                }
            },
            Self::NoHospitals => DispatchOutcome::NoHospitalsAvailable,
        }
    }
}

/// First stage of matching: which hospital wins, and whether an ambulance
/// search is possible at all.
#[derive(Debug, Clone)]
pub enum HospitalChoice {
    NoHospitals,
    /// Assigned without distance ranking because no hospital has a
    /// location. No ambulance search may follow.
    Unranked(User),
    /// Nearest hospital, but no license on file: driver compatibility
    /// cannot be established, so no ambulance search may follow.
    NearestUnlicensed(User),
    Nearest { hospital: User, license: String },
}

/// Ranks hospitals by rounded great-circle distance, nearest first, ties
/// broken by stable input order. `hospitals` must be in registration order
/// (earliest first): the no-location fallback resolves by that order too.
pub fn choose_hospital(patient: Coordinates, hospitals: &[User]) -> HospitalChoice {
    if hospitals.is_empty() {
        return HospitalChoice::NoHospitals;
    }

    let located = hospitals
        .iter()
        .filter_map(|h| h.location.map(|loc| (geo::distance_km(patient, loc), h)));

    // min_by keeps the first of equals, which is the stable-order tie-break.
    let winner = located.min_by(|(a, _), (b, _)| a.total_cmp(b));

    let hospital = match winner {
        Some((_, h)) => h.clone(),
        None => {
            let fallback = hospitals[0].clone();
            tracing::warn!(
                hospital = %fallback.id,
                "no hospital locations on file, assigning without ranking"
            );
            return HospitalChoice::Unranked(fallback);
        }
    };

    match &hospital.profile {
        RoleProfile::Hospital {
            license_number: Some(license),
            ..
        } => {
            let license = license.clone();
            HospitalChoice::Nearest { hospital, license }
        }
        _ => HospitalChoice::NearestUnlicensed(hospital),
    }
}

#[derive(Debug, Clone)]
pub struct DriverChoice {
    pub driver: User,
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<u32>,
}

/// Ranks compatible drivers by distance ascending, ties broken by id
/// lexical order. Drivers without a location stay eligible but rank last,
/// so a case can still get a driver despite stale location data.
pub fn choose_driver(patient: Coordinates, drivers: Vec<User>) -> Option<DriverChoice> {
    let mut candidates: Vec<(f64, User)> = drivers
        .into_iter()
        .map(|d| {
            let dist = d
                .location
                .map(|loc| geo::distance_km(patient, loc))
                .unwrap_or(f64::INFINITY);
            (dist, d)
        })
        .collect();
    candidates.sort_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)));

    candidates.into_iter().next().map(|(_, driver)| {
        let distance_km = driver.location.map(|loc| geo::distance_km(loc, patient));
        let eta_minutes = distance_km.map(geo::eta_minutes);
        DriverChoice {
            driver,
            distance_km,
            eta_minutes,
        }
    })
}

/// Full matcher over a snapshot of candidate state. Pure selection: the
/// caller persists whatever it decides to keep. `drivers_for_license` is
/// only invoked when the winning hospital has a license.
pub fn match_dispatch(
    patient: Coordinates,
    hospitals: &[User],
    drivers_for_license: impl FnOnce(&str) -> Vec<User>,
) -> DispatchDecision {
    match choose_hospital(patient, hospitals) {
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
            match choose_driver(patient, drivers_for_license(&license)) {
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
    }
}
