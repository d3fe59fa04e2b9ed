use async_trait::async_trait;
use imhere_db::models::GeoPoint;
use serde::Deserialize;
use tracing::{debug, warn};

use super::GeoError;

/// Address lookup in both directions.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Human-readable address for a coordinate, if one is known.
    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, GeoError>;

    /// Best coordinate match for a free-text query.
    async fn forward(&self, query: &str) -> Result<Option<GeoPoint>, GeoError>;
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

fn address_from_reverse(resp: NominatimReverse) -> Option<String> {
    if resp.error.is_some() {
        return None;
    }

    let address = resp.address.unwrap_or_default();
    let locality = address.city.or(address.town).or(address.village);
    let parts: Vec<String> = [resp.name, address.road, locality, address.state, address.country]
        .into_iter()
        .flatten()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();

    let mut deduped: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        if !deduped.contains(&part) {
            deduped.push(part);
        }
    }

    if deduped.is_empty() {
        resp.display_name.filter(|d| !d.trim().is_empty())
    } else {
        Some(deduped.join(", "))
    }
}

fn point_from_search(places: Vec<NominatimPlace>) -> Option<GeoPoint> {
    let place = places.into_iter().next()?;
    let lat = place.lat.parse::<f64>().ok()?;
    let lng = place.lon.parse::<f64>().ok()?;
    Some(GeoPoint::new(lat, lng))
}

/// Client for a Nominatim instance. The public one asks for an identifying
/// user agent and at most one request per second.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, GeoError> {
        let lat = point.lat.to_string();
        let lon = point.lng.to_string();
        let resp = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[("format", "jsonv2"), ("lat", lat.as_str()), ("lon", lon.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<NominatimReverse>()
            .await?;

        let address = address_from_reverse(resp);
        debug!(lat = point.lat, lng = point.lng, found = address.is_some(), "Reverse geocoded");
        Ok(address)
    }

    async fn forward(&self, query: &str) -> Result<Option<GeoPoint>, GeoError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let places = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "jsonv2"), ("limit", "1"), ("q", query)])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<NominatimPlace>>()
            .await?;

        Ok(point_from_search(places))
    }
}

/// `"lat, lng"` with six decimals, used when no address is available.
pub fn format_coordinates(point: GeoPoint) -> String {
    format!("{:.6}, {:.6}", point.lat, point.lng)
}

/// Reverse-geocodes `point`, falling back to its coordinates. Never fails.
pub async fn resolve_address(geocoder: &dyn Geocoder, point: GeoPoint) -> String {
    match geocoder.reverse(point).await {
        Ok(Some(address)) => address,
        Ok(None) => format_coordinates(point),
        Err(e) => {
            warn!(error = %e, "Reverse geocoding failed, using coordinates");
            format_coordinates(point)
        }
    }
}
