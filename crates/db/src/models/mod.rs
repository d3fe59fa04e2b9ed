pub mod geo;
pub mod room;
pub mod room_member;
pub mod user;

pub use geo::*;
pub use room::*;
pub use room_member::*;
pub use user::*;
