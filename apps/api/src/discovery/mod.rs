pub mod exposure;
pub mod geo;
pub mod handlers;
pub mod locations;
pub mod search;
