//! Durable-store ports.
//!
//! The engines talk to these traits only. `postgres` is the production adapter;
//! tests use the in-memory adapter from `crate::testing`. Every method is a
//! single statement or a single transaction.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::warn;

use crate::discovery::geo::LatitudeBand;
use crate::models::location::{LocationSample, NewLocation};
use crate::models::profile::Profile;
use crate::models::swipe::{AppliedSwipe, Direction, SwipeEffect, SwipeRecord, SwipeTarget, SwipeWrite};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("expected row is missing: {0}")]
    RowMissing(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Appends a sample. Fails with `UniqueViolation` when a limited sample
    /// already exists for the owner in the same day bucket.
    async fn insert_location(&self, new: NewLocation) -> Result<LocationSample, StoreError>;

    async fn latest_location(&self, owner_user_id: i64) -> Result<Option<LocationSample>, StoreError>;

    /// Most recent sample per owner, skipping the viewer and `excluded`, whose
    /// latitude falls inside `band`.
    async fn latest_locations_excluding(
        &self,
        viewer_user_id: i64,
        excluded: &[i64],
        band: LatitudeBand,
    ) -> Result<Vec<LocationSample>, StoreError>;
}

#[async_trait]
pub trait ExposureStore: Send + Sync {
    async fn shown_on(&self, viewer_user_id: i64, day: NaiveDate) -> Result<Vec<i64>, StoreError>;

    /// Inserts one exposure per id, skipping rows that already exist for the
    /// day. Returns the number of rows actually written.
    async fn insert_exposures(
        &self,
        viewer_user_id: i64,
        shown_user_ids: &[i64],
        day: NaiveDate,
        shown_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait SwipeStore: Send + Sync {
    async fn count_swipes_between(
        &self,
        swiper_user_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    async fn latest_swipe_on(
        &self,
        swiper_user_id: i64,
        swiped_user_id: i64,
    ) -> Result<Option<SwipeRecord>, StoreError>;

    async fn latest_swipe(&self, swiper_user_id: i64) -> Result<Option<SwipeRecord>, StoreError>;

    /// Persists a swipe atomically with respect to the pair. The reciprocal is
    /// read and both halves of a match are written while the pair is locked,
    /// so two crossing right swipes always end matched. Nothing is written
    /// when this fails.
    async fn apply_swipe(&self, write: SwipeWrite) -> Result<AppliedSwipe, StoreError>;

    /// Moves a record from redo_count 0 to 1. `None` when it was already redone.
    async fn mark_redone(&self, id: i64) -> Result<Option<SwipeRecord>, StoreError>;

    /// Matched records swiped by the user, one per counterpart, newest first.
    async fn matched_by(&self, user_id: i64) -> Result<Vec<SwipeRecord>, StoreError>;

    /// Unmatched right swipes received by the user, one per swiper, newest first.
    async fn liked_by_others(&self, user_id: i64) -> Result<Vec<SwipeRecord>, StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile_by_user_id(&self, user_id: i64) -> Result<Option<Profile>, StoreError>;
}

/// Profile lookup for display enrichment. Failures degrade to `None`.
pub async fn profile_best_effort(profiles: &dyn ProfileStore, user_id: i64) -> Option<Profile> {
    match profiles.profile_by_user_id(user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!("Profile enrichment failed for user {user_id}: {e}");
            None
        }
    }
}

/// What `apply_swipe` must do, given the pair's state under lock.
#[derive(Debug, Clone, PartialEq)]
pub enum SwipePlan {
    /// The pair is already matched; return the swiper's record unchanged.
    Keep(SwipeRecord),
    /// Flip the reciprocal and the swiper's record to matched.
    Match { reciprocal_id: i64 },
    /// Write the swipe without a match.
    Record,
}

impl SwipePlan {
    pub fn effect(&self) -> SwipeEffect {
        match self {
            SwipePlan::Keep(_) => SwipeEffect::AlreadyMatched,
            SwipePlan::Match { .. } => SwipeEffect::Matched,
            SwipePlan::Record => SwipeEffect::Recorded,
        }
    }
}

/// Decides a swipe against the swiper's latest record on the pair and the
/// counterpart's latest record on the pair. Shared by every adapter.
pub fn plan_swipe(
    write: &SwipeWrite,
    own_latest: Option<&SwipeRecord>,
    reciprocal_latest: Option<&SwipeRecord>,
) -> Result<SwipePlan, StoreError> {
    if let SwipeTarget::Reapply { id } = write.target {
        let reappliable = own_latest.is_some_and(|own| own.id == id && own.redo_count == 1 && !own.reapplied);
        if !reappliable {
            return Err(StoreError::RowMissing(format!("swipe {id} is not awaiting reapplication")));
        }
    }

    let reciprocal = match reciprocal_latest {
        Some(r) if write.direction == Direction::Right && r.direction == Direction::Right => r,
        _ => return Ok(SwipePlan::Record),
    };

    match own_latest {
        Some(own)
            if write.target == SwipeTarget::Fresh
                && reciprocal.matched
                && own.matched
                && own.direction == Direction::Right =>
        {
            Ok(SwipePlan::Keep(own.clone()))
        }
        _ => Ok(SwipePlan::Match {
            reciprocal_id: reciprocal.id,
        }),
    }
}
