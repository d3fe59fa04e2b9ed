use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use imhere_db::models::{Destination, GeoPoint, MemberRole, Room, RoomMember};
use imhere_services::dao::room::LeaveOutcome;
use imhere_services::geo::format_eta;
use imhere_services::RoomOverview;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(max = 200))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinRoomRequest {
    #[validate(length(min = 1, max = 16))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CoordinatesRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

impl CoordinatesRequest {
    fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub code: String,
    pub name: String,
    pub description: String,
    pub admin_id: String,
    pub admin_username: String,
    pub created_at: String,
    pub destination: Option<Destination>,
    pub is_active: bool,
    pub member_count: u32,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            created_at: room.created_at.try_to_rfc3339_string().unwrap_or_default(),
            code: room.id,
            name: room.name,
            description: room.description,
            admin_id: room.admin_id,
            admin_username: room.admin_username,
            destination: room.destination,
            is_active: room.is_active,
            member_count: room.member_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentRoomResponse {
    pub room: Option<RoomResponse>,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    pub role: MemberRole,
    pub is_active: bool,
    pub joined_at: String,
    pub rejoined_at: Option<String>,
    pub left_at: Option<String>,
    pub current_location: Option<GeoPoint>,
    pub last_updated: Option<String>,
}

fn timestamp(dt: bson::DateTime) -> String {
    dt.try_to_rfc3339_string().unwrap_or_default()
}

impl From<RoomMember> for MemberResponse {
    fn from(member: RoomMember) -> Self {
        Self {
            room_id: member.room_id,
            user_id: member.user_id,
            username: member.username,
            role: member.role,
            is_active: member.is_active,
            joined_at: timestamp(member.joined_at),
            rejoined_at: member.rejoined_at.map(timestamp),
            left_at: member.left_at.map(timestamp),
            current_location: member.current_location,
            last_updated: member.last_updated.map(timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub left: bool,
    pub room_closed: bool,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub origin: GeoPoint,
    /// The caller has no usable location, so the route starts at the fallback point.
    pub approximate_origin: bool,
    pub points: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_secs: u64,
    pub eta_text: String,
    pub fallback: bool,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    body.validate()?;

    let room = state
        .rooms
        .create(&auth, &body.name, body.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(room.into())))
}

pub async fn current(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CurrentRoomResponse>, ApiError> {
    let room = state.rooms.current_room(&auth).await?;
    Ok(Json(CurrentRoomResponse {
        room: room.map(RoomResponse::from),
    }))
}

pub async fn join(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<JoinRoomRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    body.validate()?;

    let member = state.rooms.join(&auth, &body.code).await?;
    Ok(Json(member.into()))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room = state.rooms.find(&code).await?;
    Ok(Json(room.into()))
}

pub async fn leave(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<LeaveResponse>, ApiError> {
    let outcome = state.rooms.leave(&auth, &code).await?;
    Ok(Json(LeaveResponse {
        left: true,
        room_closed: outcome == LeaveOutcome::RoomClosed,
    }))
}

pub async fn set_destination(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
    Json(body): Json<CoordinatesRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    body.validate()?;

    let room = state
        .rooms
        .set_destination(&auth, &code, body.point(), state.geocoder.as_ref())
        .await?;
    Ok(Json(room.into()))
}

pub async fn clear_destination(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room = state.rooms.clear_destination(&auth, &code).await?;
    Ok(Json(room.into()))
}

pub async fn update_location(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
    Json(body): Json<CoordinatesRequest>,
) -> Result<StatusCode, ApiError> {
    body.validate()?;

    state
        .rooms
        .update_location(&auth, &code, body.point())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    state.rooms.require_active_member(&code, &auth.user_id).await?;

    let members = state.rooms.list_members(&code).await?;
    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

pub async fn overview(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<RoomOverview>, ApiError> {
    state.rooms.require_active_member(&code, &auth.user_id).await?;

    Ok(Json(state.overview.overview(&code).await?))
}

pub async fn route(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<RouteResponse>, ApiError> {
    let route = state.overview.route_for_member(&code, &auth.user_id).await?;
    let plan = route.plan;

    Ok(Json(RouteResponse {
        origin: route.origin,
        approximate_origin: route.approximate_origin,
        eta_text: format_eta(plan.duration),
        duration_secs: plan.duration.as_secs(),
        distance_m: plan.distance_m,
        points: plan.points,
        fallback: plan.fallback,
    }))
}
