//! One-time reversal of a user's latest swipe.
//!
//! Each swipe record moves `redo_count` 0 -> 1 at most once. The `redo:<id>`
//! cache entry remembers the id of the last redone swipe so a repeat request
//! can be refused without touching the store; the conditional update in the
//! store is what actually enforces the limit.

use serde::Serialize;
use tracing::info;

use super::engine::{MatchedUser, SwipeEngine};
use crate::cache::CacheKey;
use crate::errors::AppError;
use crate::models::swipe::{MatchType, SwipeRecord};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedoOutcome {
    pub original_swipe: SwipeRecord,
    pub profiles: Vec<MatchedUser>,
}

impl SwipeEngine {
    pub async fn redo_last_swipe(&self, user_id: i64) -> Result<RedoOutcome, AppError> {
        let latest = self
            .store
            .latest_swipe(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} has no swipe history")))?;

        if self.cache.peek::<i64>(CacheKey::Redo(user_id)).await == Some(latest.id) {
            info!("Redo refused for user {user_id}: swipe {} already redone", latest.id);
            return Err(AppError::NoRedosRemaining);
        }

        let redone = self
            .store
            .mark_redone(latest.id)
            .await?
            .ok_or(AppError::NoRedosRemaining)?;

        self.cache.refresh(CacheKey::Redo(user_id), &redone.id).await;
        self.cache
            .refresh(CacheKey::SwipeHistory(user_id), &redone)
            .await;

        info!("User {user_id} redid swipe {}", redone.id);
        let profiles = self.matches(user_id, MatchType::All).await?;
        Ok(RedoOutcome {
            original_swipe: redone,
            profiles,
        })
    }
}
