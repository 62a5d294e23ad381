//! Swipe ledger and match decision engine.
//!
//! A swipe goes through three steps:
//! 1. Quota: free-tier callers get `FREE_DAILY_SWIPES` records per day bucket.
//!    A reapplication skips the quota but needs a pending redo on the prior
//!    record, and each record can be reapplied once.
//! 2. Match: a right swipe meeting an earlier right swipe from the other side
//!    flips both records to matched. A pair that is already matched is left
//!    untouched.
//! 3. Ledger: otherwise a fresh swipe is appended, or a reapplied swipe
//!    rewrites the prior record in place.
//!
//! Steps 2 and 3 run as one store operation serialized per pair. The quota
//! count is not; concurrent swipes from one user can overshoot the quota by
//! the number of in-flight requests.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{CacheAside, CacheKey};
use crate::day_bucket::{DayBuckets, SharedClock};
use crate::errors::AppError;
use crate::models::profile::Profile;
use crate::models::swipe::{Direction, MatchType, SwipeEffect, SwipeRecord, SwipeTarget, SwipeWrite};
use crate::models::user::Identity;
use crate::store::{profile_best_effort, ProfileStore, SwipeStore};

pub const FREE_DAILY_SWIPES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeKind {
    Fresh,
    /// Re-applying a swipe the caller just redid.
    Reapplication,
}

impl SwipeKind {
    pub fn from_redo_count(redo_count: i32) -> Self {
        if redo_count > 0 {
            SwipeKind::Reapplication
        } else {
            SwipeKind::Fresh
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwipeOutcome {
    pub swipe: SwipeRecord,
    pub matched: bool,
}

/// A counterpart in the caller's match list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedUser {
    pub user_id: i64,
    pub swipe_id: i64,
    pub since: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Clone)]
pub struct SwipeEngine {
    pub(super) store: Arc<dyn SwipeStore>,
    profiles: Arc<dyn ProfileStore>,
    pub(super) cache: CacheAside,
    clock: SharedClock,
    days: DayBuckets,
}

impl SwipeEngine {
    pub fn new(
        store: Arc<dyn SwipeStore>,
        profiles: Arc<dyn ProfileStore>,
        cache: CacheAside,
        clock: SharedClock,
        days: DayBuckets,
    ) -> Self {
        Self {
            store,
            profiles,
            cache,
            clock,
            days,
        }
    }

    pub async fn save_swipe(
        &self,
        caller: Identity,
        swiped_user_id: i64,
        direction: Direction,
        kind: SwipeKind,
    ) -> Result<SwipeOutcome, AppError> {
        let swiper_user_id = caller.user_id;
        if swiped_user_id <= 0 {
            return Err(AppError::Validation("swipedUserId must be positive".to_string()));
        }
        if swiped_user_id == swiper_user_id {
            return Err(AppError::Validation("Users cannot swipe on themselves".to_string()));
        }

        let target = match kind {
            SwipeKind::Fresh => {
                self.check_quota(caller).await?;
                SwipeTarget::Fresh
            }
            SwipeKind::Reapplication => {
                let prior = self
                    .store
                    .latest_swipe_on(swiper_user_id, swiped_user_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "No earlier swipe on user {swiped_user_id} to reapply"
                        ))
                    })?;
                if prior.reapplied {
                    return Err(AppError::NoRedosRemaining);
                }
                if prior.redo_count == 0 {
                    return Err(AppError::Validation(format!(
                        "Swipe {} has not been redone",
                        prior.id
                    )));
                }
                SwipeTarget::Reapply { id: prior.id }
            }
        };

        let applied = self
            .store
            .apply_swipe(SwipeWrite {
                swiper_user_id,
                swiped_user_id,
                direction,
                target,
                at: self.clock.utc(),
            })
            .await?;
        let swipe = applied.record;

        match (applied.effect, target) {
            (SwipeEffect::AlreadyMatched, _) => {
                info!("Users {swiper_user_id} and {swiped_user_id} are already matched");
                return Ok(SwipeOutcome {
                    swipe,
                    matched: true,
                });
            }
            (SwipeEffect::Matched, _) => {
                self.cache.refresh(CacheKey::SwipeHistory(swiper_user_id), &swipe).await;
                // Both users' records changed; their cached state is stale.
                self.cache.invalidate(CacheKey::SwipeHistory(swiped_user_id)).await;
                self.cache.invalidate(CacheKey::Redo(swiped_user_id)).await;
                info!("Users {swiper_user_id} and {swiped_user_id} matched");
            }
            (SwipeEffect::Recorded, SwipeTarget::Fresh) => {
                self.cache.refresh(CacheKey::SwipeHistory(swiper_user_id), &swipe).await;
            }
            (SwipeEffect::Recorded, SwipeTarget::Reapply { .. }) => {
                // The reapplied record keeps its timestamp and may no longer be
                // the latest one, so drop the entry instead of overwriting it.
                self.cache.invalidate(CacheKey::SwipeHistory(swiper_user_id)).await;
            }
        }
        self.cache.invalidate(CacheKey::Redo(swiper_user_id)).await;

        info!(
            "User {swiper_user_id} swiped {direction:?} on {swiped_user_id} ({kind:?})"
        );
        Ok(SwipeOutcome {
            matched: applied.effect == SwipeEffect::Matched,
            swipe,
        })
    }

    async fn check_quota(&self, caller: Identity) -> Result<(), AppError> {
        if caller.tier.is_premium() {
            return Ok(());
        }
        let (from, until) = self.days.bounds(self.days.bucket_of(self.clock.utc()));
        let used = self
            .store
            .count_swipes_between(caller.user_id, from, until)
            .await?;
        if used >= FREE_DAILY_SWIPES {
            info!("User {} hit the daily swipe limit ({used})", caller.user_id);
            return Err(AppError::QuotaExceeded {
                limit: FREE_DAILY_SWIPES,
            });
        }
        Ok(())
    }

    /// The caller's most recent swipe, served from the cache when possible.
    pub async fn last_swipe(&self, user_id: i64) -> Result<SwipeRecord, AppError> {
        self.cache
            .read(CacheKey::SwipeHistory(user_id), || self.store.latest_swipe(user_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} has no swipe history")))
    }

    pub async fn matches(&self, user_id: i64, match_type: MatchType) -> Result<Vec<MatchedUser>, AppError> {
        let records = match match_type {
            MatchType::All => self.store.matched_by(user_id).await?,
            MatchType::Liked => self.store.liked_by_others(user_id).await?,
        };

        let counterpart = |record: &SwipeRecord| match match_type {
            MatchType::All => record.swiped_user_id,
            MatchType::Liked => record.swiper_user_id,
        };

        let profiles = join_all(
            records
                .iter()
                .map(|record| profile_best_effort(self.profiles.as_ref(), counterpart(record))),
        )
        .await;

        Ok(records
            .iter()
            .zip(profiles)
            .map(|(record, profile)| MatchedUser {
                user_id: counterpart(record),
                swipe_id: record.id,
                since: record.swiped_at,
                profile,
            })
            .collect())
    }
}
