pub mod auth;
pub mod dao;
pub mod geo;
pub mod overview;
pub mod room_code;
pub mod store;
pub mod tracking;

pub use auth::{AuthService, Session};
pub use dao::*;
pub use overview::{MemberRoute, OverviewService, RoomOverview};
pub use store::{DocumentStore, MemoryStore, MongoStore, Subscription};
pub use tracking::{LocationProvider, LocationTracker};
