use chrono::{DateTime, Utc};
use imhere_config::GeoSettings;
use imhere_db::models::GeoPoint;
use serde::{Deserialize, Serialize};

/// Whether a GPS fix is plausible.
///
/// Rejects non-finite components, anything outside +/-90 latitude or
/// +/-180 longitude, and the one-degree box around (0, 0) that receivers
/// report before they have a fix.
pub fn is_valid_location(lat: f64, lng: f64) -> bool {
    if !lat.is_finite() || !lng.is_finite() {
        return false;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return false;
    }
    !(lat.abs() < 1.0 && lng.abs() < 1.0)
}

/// A position reading as delivered by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub point: GeoPoint,
    /// Radius of uncertainty in metres, if the provider reported one.
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(lat: f64, lng: f64, accuracy_m: Option<f64>) -> Self {
        Self {
            point: GeoPoint::new(lat, lng),
            accuracy_m,
            timestamp: Utc::now(),
        }
    }

    /// The low-confidence stand-in for a missing fix.
    pub fn fallback(fallback: &FallbackFix) -> Self {
        Self::new(fallback.point.lat, fallback.point.lng, Some(fallback.accuracy_m))
    }

    pub fn is_valid(&self) -> bool {
        is_valid_location(self.point.lat, self.point.lng)
    }
}

/// Stand-in position used when no plausible fix is available. The large
/// accuracy value marks it as low confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackFix {
    pub point: GeoPoint,
    pub accuracy_m: f64,
}

impl FallbackFix {
    pub fn from_settings(settings: &GeoSettings) -> Self {
        Self {
            point: GeoPoint::new(settings.fallback_lat, settings.fallback_lng),
            accuracy_m: settings.fallback_accuracy_m,
        }
    }

    pub fn fix(&self) -> LocationFix {
        LocationFix::fallback(self)
    }
}

impl Default for FallbackFix {
    /// Central Jakarta, 1 km accuracy.
    fn default() -> Self {
        Self {
            point: GeoPoint::new(-6.2088, 106.8456),
            accuracy_m: 1000.0,
        }
    }
}

pub fn validate_or_fallback(fix: LocationFix, fallback: &FallbackFix) -> LocationFix {
    if fix.is_valid() { fix } else { fallback.fix() }
}
