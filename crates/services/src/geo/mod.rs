pub mod distance;
pub mod eta;
pub mod geocoding;
pub mod location;
pub mod routing;

use thiserror::Error;

pub use distance::{EARTH_RADIUS_M, distance_meters};
pub use eta::{EtaModel, format_eta};
pub use geocoding::{Geocoder, NominatimGeocoder, format_coordinates, resolve_address};
pub use location::{FallbackFix, LocationFix, is_valid_location, validate_or_fallback};
pub use routing::{OsrmRouter, RoutePlan, RoutingService, plan_route};

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("No route between the given points")]
    NoRoute,
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Shared HTTP client for the OSM-backed services.
pub fn http_client(
    user_agent: &str,
    timeout: std::time::Duration,
) -> Result<reqwest::Client, GeoError> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}
