//! Great-circle distance on a spherical Earth.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude on the reference sphere.
const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::Validation(format!(
                "latitude must be between -90 and 90, got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::Validation(format!(
                "longitude must be between -180 and 180, got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Haversine distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Latitude range that can contain points within a radius of a center.
///
/// Any two points are at least `R * |Δlat|` apart, so rows outside the band
/// can be discarded before computing exact distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatitudeBand {
    pub min_latitude: f64,
    pub max_latitude: f64,
}

impl LatitudeBand {
    pub fn around(center: Coordinates, radius_km: f64) -> Self {
        let span = radius_km / KM_PER_DEGREE;
        Self {
            min_latitude: (center.latitude - span).max(-90.0),
            max_latitude: (center.latitude + span).min(90.0),
        }
    }

    pub fn contains(&self, latitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
    }
}
