pub mod base;
pub mod room;
pub mod user;

pub use base::BaseDao;
