//! Daily exposure ledger: which candidates a viewer has already been shown in
//! the current day bucket.
//!
//! At-most-once per (viewer, candidate, day) is enforced by the store's unique
//! constraint. Two searches racing for the same viewer both succeed; the losing
//! insert is a no-op.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::day_bucket::{DayBuckets, SharedClock};
use crate::store::{ExposureStore, StoreError};

#[derive(Clone)]
pub struct ExposureLedger {
    store: Arc<dyn ExposureStore>,
    clock: SharedClock,
    days: DayBuckets,
}

impl ExposureLedger {
    pub fn new(store: Arc<dyn ExposureStore>, clock: SharedClock, days: DayBuckets) -> Self {
        Self { store, clock, days }
    }

    /// Current instant and the day bucket it falls in.
    pub fn today(&self) -> (DateTime<Utc>, NaiveDate) {
        let now = self.clock.utc();
        (now, self.days.bucket_of(now))
    }

    pub async fn already_shown_on(&self, viewer_user_id: i64, day: NaiveDate) -> Result<HashSet<i64>, StoreError> {
        let shown: HashSet<i64> = self
            .store
            .shown_on(viewer_user_id, day)
            .await?
            .into_iter()
            .collect();
        debug!("Viewer {viewer_user_id} has seen {} candidates on {day}", shown.len());
        Ok(shown)
    }

    pub async fn record_shown_on(
        &self,
        viewer_user_id: i64,
        shown_user_ids: &[i64],
        day: NaiveDate,
        shown_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let unique: Vec<i64> = shown_user_ids
            .iter()
            .copied()
            .filter(|id| *id != viewer_user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Ok(0);
        }

        match self
            .store
            .insert_exposures(viewer_user_id, &unique, day, shown_at)
            .await
        {
            Ok(written) => {
                info!(
                    "Recorded {written}/{} exposures for viewer {viewer_user_id} on {day}",
                    unique.len()
                );
                Ok(written)
            }
            Err(StoreError::UniqueViolation(detail)) => {
                debug!("Exposure already recorded for viewer {viewer_user_id}: {detail}");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}
