pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::discovery::handlers as discovery;
use crate::state::AppState;
use crate::swipes::handlers as swipes;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Discovery
        .route("/locations", post(discovery::handle_share_location))
        .route("/locations/nearby", post(discovery::handle_nearby))
        // Swipes
        .route("/swipes", post(swipes::handle_swipe))
        .route("/swipes/matches", get(swipes::handle_matches))
        .route("/swipes/redo", post(swipes::handle_redo))
        .route("/swipes/last", get(swipes::handle_last_swipe))
        .with_state(state)
}
