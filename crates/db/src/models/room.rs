use bson::DateTime;
use serde::{Deserialize, Serialize};

use super::geo::Destination;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// The room code doubles as the document id.
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub admin_id: String,
    pub admin_username: String,
    pub created_at: DateTime,
    pub destination: Option<Destination>,
    #[serde(default = "bool_true")]
    pub is_active: bool,
    #[serde(default)]
    pub member_count: u32,
}

fn bool_true() -> bool {
    true
}

impl Room {
    pub const COLLECTION: &'static str = "rooms";

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_id == user_id
    }
}
