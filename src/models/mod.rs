pub mod driver;
pub mod position;
pub mod ride;
pub mod rider;
