pub mod location;
pub mod profile;
pub mod swipe;
pub mod user;
