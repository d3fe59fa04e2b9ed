use bson::{Bson, DateTime, doc};
use imhere_config::RoomSettings;
use imhere_db::models::{Destination, GeoPoint, MemberRole, Room, RoomMember};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::base::{BaseDao, DaoError, DaoResult};
use crate::auth::Session;
use crate::geo::{Geocoder, is_valid_location, resolve_address};
use crate::room_code::{RoomCodeAllocator, normalize_room_code};
use crate::store::{DocumentStore, Subscription};

/// What a leave did besides deactivating the membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    /// The admin left, so the room was deactivated as well.
    RoomClosed,
}

pub struct RoomDao {
    pub rooms: BaseDao<Room>,
    pub members: BaseDao<RoomMember>,
    allocator: RoomCodeAllocator,
    settings: RoomSettings,
}

impl RoomDao {
    pub fn new(store: Arc<dyn DocumentStore>, settings: RoomSettings, watch_buffer: usize) -> Self {
        Self {
            rooms: BaseDao::new(store.clone(), Room::COLLECTION).with_watch_buffer(watch_buffer),
            members: BaseDao::new(store, RoomMember::COLLECTION).with_watch_buffer(watch_buffer),
            allocator: RoomCodeAllocator::new(settings.max_code_attempts),
            settings,
        }
    }

    pub async fn create(
        &self,
        session: &Session,
        name: &str,
        description: Option<&str>,
    ) -> DaoResult<Room> {
        let name = name.trim();
        let name_len = name.chars().count();
        if name_len == 0 || name_len > self.settings.max_name_len {
            return Err(DaoError::Validation(format!(
                "Room name must be 1 to {} characters",
                self.settings.max_name_len
            )));
        }

        let description = description.map(str::trim).unwrap_or_default();
        if description.chars().count() > self.settings.max_description_len {
            return Err(DaoError::Validation(format!(
                "Description must be at most {} characters",
                self.settings.max_description_len
            )));
        }
        let description = if description.is_empty() {
            self.settings.default_description.clone()
        } else {
            description.to_string()
        };

        if let Some(current) = self.current_room(session).await? {
            return Err(DaoError::Conflict(format!(
                "Already active in room {}",
                current.id
            )));
        }

        let template = Room {
            id: String::new(),
            name: name.to_string(),
            description,
            admin_id: session.user_id.clone(),
            admin_username: session.username.clone(),
            created_at: DateTime::now(),
            destination: None,
            is_active: true,
            member_count: 1,
        };

        let code = self
            .allocator
            .allocate(|code| {
                let rooms = self.rooms.clone();
                let room = Room {
                    id: code,
                    ..template.clone()
                };
                async move { rooms.create(&room.id, &room).await }
            })
            .await?;

        let member = RoomMember {
            id: RoomMember::key(&code, &session.user_id),
            room_id: code.clone(),
            user_id: session.user_id.clone(),
            username: session.username.clone(),
            email: session.email.clone(),
            role: MemberRole::Admin,
            is_active: true,
            joined_at: template.created_at,
            rejoined_at: None,
            left_at: None,
            current_location: None,
            last_updated: None,
        };
        self.members.set(&member.id, &member).await?;

        info!(%code, admin_id = %session.user_id, "Created room");
        Ok(Room { id: code, ..template })
    }

    pub async fn find(&self, code: &str) -> DaoResult<Room> {
        self.rooms.find_by_id(&normalize_room_code(code)).await
    }

    pub async fn find_member(&self, code: &str, user_id: &str) -> DaoResult<Option<RoomMember>> {
        self.members
            .get(&RoomMember::key(&normalize_room_code(code), user_id))
            .await
    }

    /// Active membership of `user_id` in `code`, or `Forbidden`.
    pub async fn require_active_member(&self, code: &str, user_id: &str) -> DaoResult<RoomMember> {
        match self.find_member(code, user_id).await? {
            Some(member) if member.is_active => Ok(member),
            _ => Err(DaoError::Forbidden(format!(
                "Not an active member of room {}",
                normalize_room_code(code)
            ))),
        }
    }

    pub async fn join(&self, session: &Session, code: &str) -> DaoResult<RoomMember> {
        let code = normalize_room_code(code);
        let room = self.rooms.find_by_id(&code).await?;
        if !room.is_active {
            return Err(DaoError::RoomInactive(code));
        }

        if let Some(current) = self.current_room(session).await? {
            if current.id != code {
                return Err(DaoError::Conflict(format!(
                    "Already active in room {}",
                    current.id
                )));
            }
        }

        let key = RoomMember::key(&code, &session.user_id);
        let member = match self.members.get(&key).await? {
            Some(existing) if existing.is_active => {
                debug!(%code, user_id = %session.user_id, "Already an active member");
                return Ok(existing);
            }
            Some(_) => {
                self.members
                    .update_by_id(
                        &key,
                        doc! { "is_active": true, "rejoined_at": DateTime::now() },
                    )
                    .await?;
                info!(%code, user_id = %session.user_id, "Member rejoined room");
                self.members.find_by_id(&key).await?
            }
            None => {
                let member = RoomMember {
                    id: key.clone(),
                    room_id: code.clone(),
                    user_id: session.user_id.clone(),
                    username: session.username.clone(),
                    email: session.email.clone(),
                    role: MemberRole::Member,
                    is_active: true,
                    joined_at: DateTime::now(),
                    rejoined_at: None,
                    left_at: None,
                    current_location: None,
                    last_updated: None,
                };
                self.members.set(&key, &member).await?;
                info!(%code, user_id = %session.user_id, "Member joined room");
                member
            }
        };

        self.refresh_member_count(&code).await?;
        Ok(member)
    }

    pub async fn leave(&self, session: &Session, code: &str) -> DaoResult<LeaveOutcome> {
        let code = normalize_room_code(code);
        let key = RoomMember::key(&code, &session.user_id);
        match self.members.get(&key).await? {
            Some(member) if member.is_active => {}
            _ => return Err(DaoError::NotFound),
        }

        self.members
            .update_by_id(&key, doc! { "is_active": false, "left_at": DateTime::now() })
            .await?;
        info!(%code, user_id = %session.user_id, "Member left room");

        let Some(room) = self.rooms.get(&code).await? else {
            return Ok(LeaveOutcome::Left);
        };

        if room.is_admin(&session.user_id) {
            self.rooms
                .update_by_id(&code, doc! { "is_active": false })
                .await?;
            self.refresh_member_count(&code).await?;
            info!(%code, "Admin left, room closed");
            return Ok(LeaveOutcome::RoomClosed);
        }

        self.refresh_member_count(&code).await?;
        Ok(LeaveOutcome::Left)
    }

    /// The room the user is active in. A membership whose room is gone or
    /// closed is deactivated on the way.
    pub async fn current_room(&self, session: &Session) -> DaoResult<Option<Room>> {
        let memberships = self
            .members
            .find_where("user_id", session.user_id.as_str())
            .await?;

        for member in memberships.into_iter().filter(|m| m.is_active) {
            match self.rooms.get(&member.room_id).await? {
                Some(room) if room.is_active => return Ok(Some(room)),
                stale => {
                    warn!(
                        room_id = %member.room_id,
                        user_id = %session.user_id,
                        room_exists = stale.is_some(),
                        "Deactivating stale membership"
                    );
                    self.members
                        .update_by_id(
                            &member.id,
                            doc! { "is_active": false, "left_at": DateTime::now() },
                        )
                        .await?;
                }
            }
        }

        Ok(None)
    }

    pub async fn set_destination(
        &self,
        session: &Session,
        code: &str,
        point: GeoPoint,
        geocoder: &dyn Geocoder,
    ) -> DaoResult<Room> {
        let code = normalize_room_code(code);
        let room = self.admin_room(session, &code).await?;
        if !room.is_active {
            return Err(DaoError::RoomInactive(code));
        }
        if !is_valid_location(point.lat, point.lng) {
            return Err(DaoError::Validation("Destination coordinates are not plausible".into()));
        }

        let destination = Destination {
            lat: point.lat,
            lng: point.lng,
            address: resolve_address(geocoder, point).await,
        };
        self.rooms
            .update_by_id(
                &code,
                doc! { "destination": bson::to_bson(&destination)? },
            )
            .await?;
        info!(%code, address = %destination.address, "Destination set");

        Ok(Room {
            destination: Some(destination),
            ..room
        })
    }

    pub async fn clear_destination(&self, session: &Session, code: &str) -> DaoResult<Room> {
        let code = normalize_room_code(code);
        let room = self.admin_room(session, &code).await?;
        self.rooms
            .update_by_id(&code, doc! { "destination": Bson::Null })
            .await?;
        info!(%code, "Destination cleared");
        Ok(Room {
            destination: None,
            ..room
        })
    }

    async fn admin_room(&self, session: &Session, code: &str) -> DaoResult<Room> {
        let room = self.rooms.find_by_id(code).await?;
        if !room.is_admin(&session.user_id) {
            return Err(DaoError::Forbidden("Only the room admin can do that".into()));
        }
        Ok(room)
    }

    pub async fn update_location(
        &self,
        session: &Session,
        code: &str,
        point: GeoPoint,
    ) -> DaoResult<()> {
        if !is_valid_location(point.lat, point.lng) {
            return Err(DaoError::Validation("Location is not plausible".into()));
        }

        let code = normalize_room_code(code);
        let member = self.require_active_member(&code, &session.user_id).await?;
        self.members
            .update_by_id(
                &member.id,
                doc! {
                    "current_location": bson::to_bson(&point)?,
                    "last_updated": DateTime::now(),
                },
            )
            .await?;
        debug!(%code, user_id = %session.user_id, lat = point.lat, lng = point.lng, "Location updated");
        Ok(())
    }

    /// Every membership record of the room, earliest joiner first.
    pub async fn list_members(&self, code: &str) -> DaoResult<Vec<RoomMember>> {
        let mut members = self
            .members
            .find_where("room_id", normalize_room_code(code))
            .await?;
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    /// Recounts active memberships and stores the result on the room.
    pub async fn refresh_member_count(&self, code: &str) -> DaoResult<u32> {
        let count = self
            .list_members(code)
            .await?
            .iter()
            .filter(|m| m.is_active)
            .count() as u32;
        self.rooms
            .update_by_id(code, doc! { "member_count": count as i64 })
            .await?;
        Ok(count)
    }

    pub async fn watch_room(&self, code: &str) -> DaoResult<Subscription<Option<Room>>> {
        self.rooms.watch_by_id(&normalize_room_code(code)).await
    }

    pub async fn watch_members(&self, code: &str) -> DaoResult<Subscription<Vec<RoomMember>>> {
        self.members
            .watch_where("room_id", normalize_room_code(code))
            .await
    }
}
