use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheAside, CacheKey};
use crate::day_bucket::{DayBuckets, SharedClock};
use crate::discovery::geo::Coordinates;
use crate::errors::AppError;
use crate::models::location::{LocationSample, NewLocation};
use crate::models::user::Identity;
use crate::store::{LocationStore, StoreError};

/// Location sharing and current-location lookup, both through the cache.
#[derive(Clone)]
pub struct LocationService {
    store: Arc<dyn LocationStore>,
    cache: CacheAside,
    clock: SharedClock,
    days: DayBuckets,
}

impl LocationService {
    pub fn new(
        store: Arc<dyn LocationStore>,
        cache: CacheAside,
        clock: SharedClock,
        days: DayBuckets,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            days,
        }
    }

    /// Appends a sample for the caller. Free users get one share per day.
    pub async fn share(&self, caller: Identity, at: Coordinates) -> Result<LocationSample, AppError> {
        let now = self.clock.utc();
        let new = NewLocation {
            owner_user_id: caller.user_id,
            latitude: at.latitude,
            longitude: at.longitude,
            captured_at: now,
            day_bucket: self.days.bucket_of(now),
            daily_limited: !caller.tier.is_premium(),
        };

        let sample = self
            .cache
            .write(CacheKey::Location(caller.user_id), || async move {
                self.store.insert_location(new).await.map_err(|e| match e {
                    StoreError::UniqueViolation(_) => {
                        AppError::Conflict("Location already shared today".to_string())
                    }
                    other => AppError::Store(other),
                })
            })
            .await?;

        info!(
            "User {} shared location {} ({:.5}, {:.5})",
            caller.user_id, sample.id, sample.latitude, sample.longitude
        );
        Ok(sample)
    }

    pub async fn current_location(&self, user_id: i64) -> Result<LocationSample, AppError> {
        self.cache
            .read(CacheKey::Location(user_id), || self.store.latest_location(user_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No location known for user {user_id}")))
    }
}
