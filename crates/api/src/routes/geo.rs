use axum::{
    Json,
    extract::{Query, State},
};
use imhere_db::models::GeoPoint;
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct SearchParams {
    #[validate(length(min = 3, max = 200))]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub point: GeoPoint,
}

/// Forward-geocodes an address typed while picking a destination.
pub async fn search(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    params.validate()?;
    let query = params.q.trim().to_string();

    let point = state
        .geocoder
        .forward(&query)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No place matches '{}'", query)))?;
    debug!(user_id = %auth.user_id, %query, lat = point.lat, lng = point.lng, "Address resolved");

    Ok(Json(SearchResponse { query, point }))
}
