use async_trait::async_trait;
use imhere_db::models::GeoPoint;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{GeoError, distance_meters, eta::EtaModel};

/// Road-network path finder.
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Ordered path from `from` to `to`, following roads where possible.
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<Vec<GeoPoint>, GeoError>;
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: `[lng, lat]`.
    coordinates: Vec<[f64; 2]>,
}

/// Client for an OSRM `route` endpoint (the public demo server by default).
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn route_url(&self, from: GeoPoint, to: GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        )
    }
}

fn path_from_response(resp: OsrmResponse) -> Result<Vec<GeoPoint>, GeoError> {
    if resp.code != "Ok" {
        return Err(GeoError::Upstream(
            resp.message.unwrap_or(resp.code),
        ));
    }

    let route = resp.routes.into_iter().next().ok_or(GeoError::NoRoute)?;
    let path: Vec<GeoPoint> = route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lng, lat]| GeoPoint::new(lat, lng))
        .collect();

    if path.len() < 2 {
        return Err(GeoError::NoRoute);
    }
    Ok(path)
}

#[async_trait]
impl RoutingService for OsrmRouter {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<Vec<GeoPoint>, GeoError> {
        let resp = self
            .client
            .get(self.route_url(from, to))
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await?
            .error_for_status()?
            .json::<OsrmResponse>()
            .await?;

        let path = path_from_response(resp)?;
        debug!(points = path.len(), "OSRM route resolved");
        Ok(path)
    }
}

/// Path plus a heuristic distance and duration for display.
#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub points: Vec<GeoPoint>,
    /// Great-circle distance between the endpoints, in metres.
    pub distance_m: f64,
    pub duration: Duration,
    /// True when the routing service failed and `points` is a straight line.
    pub fallback: bool,
}

/// Asks `router` for a road path and falls back to a straight segment when it
/// is unavailable. Never fails.
pub async fn plan_route(
    router: &dyn RoutingService,
    from: GeoPoint,
    to: GeoPoint,
    model: &EtaModel,
) -> RoutePlan {
    let distance_m = distance_meters(from, to);
    let duration = model.estimate(distance_m);

    match router.route(from, to).await {
        Ok(points) => RoutePlan {
            points,
            distance_m,
            duration,
            fallback: false,
        },
        Err(e) => {
            warn!(error = %e, "Routing service unavailable, using straight line");
            RoutePlan {
                points: vec![from, to],
                distance_m,
                duration,
                fallback: true,
            }
        }
    }
}
