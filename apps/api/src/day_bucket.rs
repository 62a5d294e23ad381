//! Day buckets scope every "once per day" rule (exposures, free-tier location
//! shares, swipe quota) to a calendar date in one fixed reference timezone.
//!
//! Buckets are derived from the clock at call time. Nothing rotates them.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use mockable::Clock;

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct DayBuckets {
    offset: FixedOffset,
}

impl DayBuckets {
    pub fn new(offset_minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(offset_minutes * 60)
            .with_context(|| format!("invalid day bucket offset: {offset_minutes} minutes"))?;
        Ok(Self { offset })
    }

    #[cfg(test)]
    pub fn utc() -> Self {
        use chrono::Offset;
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn bucket_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Half-open UTC range `[start, end)` covered by `day`.
    pub fn bounds(&self, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_midnight = day.and_time(NaiveTime::MIN);
        let shift = TimeDelta::seconds(i64::from(self.offset.local_minus_utc()));
        let start = Utc.from_utc_datetime(&(local_midnight - shift));
        (start, start + TimeDelta::days(1))
    }
}
