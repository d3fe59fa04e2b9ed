use chrono::{DateTime, Utc};
use imhere_db::models::{Destination, GeoPoint, MemberRole, Room, RoomMember};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::dao::base::{DaoError, DaoResult};
use crate::dao::room::RoomDao;
use crate::geo::{
    EtaModel, FallbackFix, RoutePlan, RoutingService, distance_meters, is_valid_location, plan_route,
};
use crate::store::Subscription;

/// One member pin on the room map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberPosition {
    pub user_id: String,
    pub username: String,
    pub role: MemberRole,
    pub is_admin: bool,
    pub location: GeoPoint,
    pub last_updated: Option<DateTime<Utc>>,
    /// Straight-line distance to the destination, when one is set.
    pub distance_m: Option<f64>,
    pub eta_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomOverview {
    pub code: String,
    pub name: String,
    pub description: String,
    pub admin_id: String,
    pub is_active: bool,
    pub member_count: u32,
    pub destination: Option<Destination>,
    pub members: Vec<MemberPosition>,
}

/// Active members with a plausible location, annotated against the
/// destination. Members without a usable fix are left off the map.
pub fn project_overview(room: &Room, members: &[RoomMember], eta: &EtaModel) -> RoomOverview {
    let destination = room.destination.as_ref().map(Destination::point);

    let members = members
        .iter()
        .filter(|m| m.is_active)
        .filter_map(|m| {
            let location = m.current_location?;
            if !is_valid_location(location.lat, location.lng) {
                return None;
            }
            let distance_m = destination.map(|d| distance_meters(location, d));
            Some(MemberPosition {
                user_id: m.user_id.clone(),
                username: m.username.clone(),
                role: m.role,
                is_admin: room.is_admin(&m.user_id),
                location,
                last_updated: m.last_updated.map(|t| t.to_chrono()),
                distance_m,
                eta_text: distance_m.map(|d| eta.describe(d)),
            })
        })
        .collect();

    RoomOverview {
        code: room.id.clone(),
        name: room.name.clone(),
        description: room.description.clone(),
        admin_id: room.admin_id.clone(),
        is_active: room.is_active,
        member_count: room.member_count,
        destination: room.destination.clone(),
        members,
    }
}

/// A member's route to the destination and where it starts.
#[derive(Debug, Clone, Serialize)]
pub struct MemberRoute {
    pub plan: RoutePlan,
    pub origin: GeoPoint,
    /// The member has no usable fix, so the route starts at the fallback point.
    pub approximate_origin: bool,
}

/// Read side of the room map: snapshots, live updates and routes.
pub struct OverviewService {
    rooms: Arc<RoomDao>,
    router: Arc<dyn RoutingService>,
    eta: EtaModel,
    route_eta: EtaModel,
    fallback: FallbackFix,
    watch_buffer: usize,
}

impl OverviewService {
    pub fn new(
        rooms: Arc<RoomDao>,
        router: Arc<dyn RoutingService>,
        eta: EtaModel,
        route_eta: EtaModel,
        fallback: FallbackFix,
        watch_buffer: usize,
    ) -> Self {
        Self {
            rooms,
            router,
            eta,
            route_eta,
            fallback,
            watch_buffer,
        }
    }

    pub async fn overview(&self, code: &str) -> DaoResult<RoomOverview> {
        let room = self.rooms.find(code).await?;
        let members = self.rooms.list_members(&room.id).await?;
        Ok(project_overview(&room, &members, &self.eta))
    }

    /// Road route from the member's last location to the destination. A member
    /// without a plausible location starts from the fallback point.
    pub async fn route_for_member(&self, code: &str, user_id: &str) -> DaoResult<MemberRoute> {
        let room = self.rooms.find(code).await?;
        let destination = room
            .destination
            .as_ref()
            .ok_or_else(|| DaoError::Validation("Room has no destination yet".into()))?;
        let member = self.rooms.require_active_member(&room.id, user_id).await?;
        let (origin, approximate_origin) = match member
            .current_location
            .filter(|p| is_valid_location(p.lat, p.lng))
        {
            Some(point) => (point, false),
            None => {
                debug!(code = %room.id, %user_id, "No usable location, routing from fallback");
                (self.fallback.point, true)
            }
        };

        let plan = plan_route(self.router.as_ref(), origin, destination.point(), &self.route_eta).await;
        Ok(MemberRoute {
            plan,
            origin,
            approximate_origin,
        })
    }

    /// Re-projects the overview whenever the room or any of its memberships
    /// changes. Ends when the room is deleted.
    pub async fn watch(&self, code: &str) -> DaoResult<Subscription<RoomOverview>> {
        let room = self.rooms.find(code).await?;
        let mut room_sub = self.rooms.watch_room(&room.id).await?;
        let mut member_sub = self.rooms.watch_members(&room.id).await?;
        let eta = self.eta.clone();
        let code = room.id;

        Ok(Subscription::spawn(self.watch_buffer, move |tx| async move {
            let mut room: Option<Room> = None;
            let mut members: Option<Vec<RoomMember>> = None;
            let mut last: Option<RoomOverview> = None;

            loop {
                tokio::select! {
                    snapshot = room_sub.next() => match snapshot {
                        Some(Some(r)) => room = Some(r),
                        Some(None) => {
                            debug!(%code, "Watched room was deleted");
                            return;
                        }
                        None => return,
                    },
                    snapshot = member_sub.next() => match snapshot {
                        Some(m) => members = Some(m),
                        None => return,
                    },
                }

                let (Some(r), Some(m)) = (&room, &members) else {
                    continue;
                };
                let overview = project_overview(r, m, &eta);
                if last.as_ref() == Some(&overview) {
                    continue;
                }
                last = Some(overview.clone());
                if tx.send(overview).await.is_err() {
                    return;
                }
            }
        }))
    }
}
