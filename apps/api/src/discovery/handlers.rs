use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::discovery::geo::Coordinates;
use crate::discovery::search::{NearbyCandidate, NearbyQuery, NearbyRequest};
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::location::LocationSample;
use crate::models::user::Identity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ShareLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// POST /locations
pub async fn handle_share_location(
    State(state): State<AppState>,
    caller: Identity,
    AppJson(req): AppJson<ShareLocationRequest>,
) -> Result<(StatusCode, Json<LocationSample>), AppError> {
    let at = Coordinates::new(req.latitude, req.longitude)?;
    let sample = state.locations.share(caller, at).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}

/// POST /locations/nearby
pub async fn handle_nearby(
    State(state): State<AppState>,
    caller: Identity,
    AppJson(req): AppJson<NearbyRequest>,
) -> Result<Json<Vec<NearbyCandidate>>, AppError> {
    let query = NearbyQuery::try_from(req)?;
    let candidates = state.search.find_nearby(caller.user_id, query).await?;
    Ok(Json(candidates))
}
