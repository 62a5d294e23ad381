use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::models::swipe::{Direction, MatchType, SwipeRecord};
use crate::models::user::Identity;
use crate::state::AppState;
use crate::swipes::engine::{MatchedUser, SwipeKind};
use crate::swipes::redo::RedoOutcome;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRequest {
    pub swiped_user_id: i64,
    pub direction: Direction,
    #[serde(default)]
    pub redo_count: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeResponse {
    pub swipe: SwipeRecord,
    pub match_status: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchesParams {
    pub match_type: Option<String>,
}

/// POST /swipes
pub async fn handle_swipe(
    State(state): State<AppState>,
    caller: Identity,
    AppJson(req): AppJson<SwipeRequest>,
) -> Result<Json<SwipeResponse>, AppError> {
    let kind = SwipeKind::from_redo_count(req.redo_count);
    let outcome = state
        .swipes
        .save_swipe(caller, req.swiped_user_id, req.direction, kind)
        .await?;

    Ok(Json(SwipeResponse {
        swipe: outcome.swipe,
        match_status: if outcome.matched { "Matched" } else { "Not Matched" },
    }))
}

/// GET /swipes/matches?matchType=all|liked
pub async fn handle_matches(
    State(state): State<AppState>,
    caller: Identity,
    AppQuery(params): AppQuery<MatchesParams>,
) -> Result<Json<Vec<MatchedUser>>, AppError> {
    let match_type = match params.match_type.as_deref() {
        None | Some("") => MatchType::All,
        Some(raw) => raw.parse::<MatchType>().map_err(AppError::Validation)?,
    };
    let matches = state.swipes.matches(caller.user_id, match_type).await?;
    Ok(Json(matches))
}

/// POST /swipes/redo
pub async fn handle_redo(
    State(state): State<AppState>,
    caller: Identity,
) -> Result<Json<RedoOutcome>, AppError> {
    let outcome = state.swipes.redo_last_swipe(caller.user_id).await?;
    Ok(Json(outcome))
}

/// GET /swipes/last
pub async fn handle_last_swipe(
    State(state): State<AppState>,
    caller: Identity,
) -> Result<Json<SwipeRecord>, AppError> {
    let swipe = state.swipes.last_swipe(caller.user_id).await?;
    Ok(Json(swipe))
}
