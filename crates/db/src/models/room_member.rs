use bson::DateTime;
use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMember {
    #[serde(rename = "_id")]
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: MemberRole,
    pub is_active: bool,
    pub joined_at: DateTime,
    pub rejoined_at: Option<DateTime>,
    pub left_at: Option<DateTime>,
    pub current_location: Option<GeoPoint>,
    pub last_updated: Option<DateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

impl RoomMember {
    pub const COLLECTION: &'static str = "room_members";

    /// Composite document id of a membership.
    pub fn key(room_id: &str, user_id: &str) -> String {
        format!("{}_{}", room_id, user_id)
    }
}
