use serde::{Deserialize, Serialize};

/// Assumed ambulance speed for ETA math in city traffic.
pub const AVERAGE_SPEED_KMH: f64 = 60.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn in_range(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance (haversine), unrounded.
pub fn distance_km_raw(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Distance rounded to 0.1 km, the resolution the API reports.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    (distance_km_raw(a, b) * 10.0).round() / 10.0
}

pub fn distance_m(a: Coordinates, b: Coordinates) -> f64 {
    distance_km_raw(a, b) * 1000.0
}

/// Whole minutes, rounded up so we never promise an arrival earlier than
/// the speed model supports.
pub fn eta_minutes(distance_km: f64) -> u32 {
    (distance_km / AVERAGE_SPEED_KMH * 60.0).ceil() as u32
}
