//! In-memory adapters and fixtures shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use serde_json::json;

use crate::auth::JwtIdentity;
use crate::cache::{CacheAside, CacheError, KvCache};
use crate::day_bucket::DayBuckets;
use crate::discovery::exposure::ExposureLedger;
use crate::discovery::geo::LatitudeBand;
use crate::discovery::locations::LocationService;
use crate::discovery::search::ProximitySearch;
use crate::models::location::{LocationSample, NewLocation};
use crate::models::profile::Profile;
use crate::models::swipe::{AppliedSwipe, Direction, SwipeRecord, SwipeTarget, SwipeWrite};
use crate::state::{AppState, Backends};
use crate::store::{plan_swipe, ExposureStore, LocationStore, ProfileStore, StoreError, SwipePlan, SwipeStore};
use crate::swipes::engine::SwipeEngine;

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_TTL: Duration = Duration::from_secs(86_400);

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.0.lock().expect("clock mutex")
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    pub fn advance_days(&self, days: i64) {
        *self.lock_clock() += TimeDelta::days(days);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Mid-morning UTC, far from a day boundary.
pub fn fixture_clock() -> Arc<MutableClock> {
    let start = Utc
        .with_ymd_and_hms(2026, 5, 4, 10, 0, 0)
        .single()
        .expect("valid fixture timestamp");
    Arc::new(MutableClock::new(start))
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct StoredLocation {
    sample: LocationSample,
    day_bucket: NaiveDate,
    daily_limited: bool,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    locations: Vec<StoredLocation>,
    exposures: Vec<(i64, i64, NaiveDate)>,
    swipes: Vec<SwipeRecord>,
    profiles: HashMap<i64, Profile>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn swipe_mut(&mut self, id: i64) -> Option<&mut SwipeRecord> {
        self.swipes.iter_mut().find(|s| s.id == id)
    }

    fn latest_on_pair(&self, swiper_user_id: i64, swiped_user_id: i64) -> Option<SwipeRecord> {
        self.swipes
            .iter()
            .filter(|s| s.swiper_user_id == swiper_user_id && s.swiped_user_id == swiped_user_id)
            .min_by(|a, b| newest_first(a, b))
            .cloned()
    }
}

fn find_mut(records: &mut [SwipeRecord], id: i64) -> Result<&mut SwipeRecord, StoreError> {
    records
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| StoreError::RowMissing(format!("swipe {id}")))
}

fn newest_first(a: &SwipeRecord, b: &SwipeRecord) -> std::cmp::Ordering {
    b.swiped_at.cmp(&a.swiped_at).then(b.id.cmp(&a.id))
}

/// Latest record per key, newest first.
fn latest_per<F: Fn(&SwipeRecord) -> i64>(records: Vec<SwipeRecord>, key: F) -> Vec<SwipeRecord> {
    let mut latest: HashMap<i64, SwipeRecord> = HashMap::new();
    for record in records {
        let k = key(&record);
        let newer = latest
            .get(&k)
            .map_or(true, |existing| newest_first(&record, existing).is_lt());
        if newer {
            latest.insert(k, record);
        }
    }
    let mut out: Vec<SwipeRecord> = latest.into_values().collect();
    out.sort_by(newest_first);
    out
}

/// Implements every store port over plain collections, including the unique
/// constraints the Postgres schema enforces.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    profiles_failing: AtomicBool,
    exposures_conflicting: AtomicBool,
    swipe_transactions_breaking: AtomicBool,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("store mutex")
    }

    /// Adds a sample outside the daily limit.
    pub fn seed_location(&self, owner_user_id: i64, latitude: f64, longitude: f64, at: DateTime<Utc>) {
        let mut tables = self.tables();
        let id = tables.next_id();
        tables.locations.push(StoredLocation {
            sample: LocationSample {
                id,
                owner_user_id,
                latitude,
                longitude,
                captured_at: at,
            },
            day_bucket: at.date_naive(),
            daily_limited: false,
        });
    }

    pub fn seed_profile(&self, user_id: i64, about_me: &str) {
        let mut tables = self.tables();
        let profile_id = tables.next_id();
        tables.profiles.insert(
            user_id,
            Profile {
                profile_id,
                user_id,
                about_me: Some(about_me.to_string()),
                photos: json!([]),
                interests: json!(["hiking"]),
                relationship_goals: None,
                height: Some(170),
                language: Some("en".to_string()),
                zodiac_sign: None,
                education_details: None,
            },
        );
    }

    pub fn set_profiles_failing(&self, failing: bool) {
        self.profiles_failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_exposures_with_unique_violation(&self) {
        self.exposures_conflicting.store(true, Ordering::SeqCst);
    }

    /// Makes every swipe transaction fail after its first staged write.
    pub fn break_swipe_transactions(&self, breaking: bool) {
        self.swipe_transactions_breaking.store(breaking, Ordering::SeqCst);
    }

    pub fn location_count(&self) -> usize {
        self.tables().locations.len()
    }

    pub fn exposure_count(&self) -> usize {
        self.tables().exposures.len()
    }

    pub fn swipes(&self) -> Vec<SwipeRecord> {
        self.tables().swipes.clone()
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn insert_location(&self, new: NewLocation) -> Result<LocationSample, StoreError> {
        let mut tables = self.tables();
        if new.daily_limited
            && tables.locations.iter().any(|l| {
                l.daily_limited
                    && l.sample.owner_user_id == new.owner_user_id
                    && l.day_bucket == new.day_bucket
            })
        {
            return Err(StoreError::UniqueViolation(
                "location_samples_one_limited_share_per_day".to_string(),
            ));
        }
        let sample = LocationSample {
            id: tables.next_id(),
            owner_user_id: new.owner_user_id,
            latitude: new.latitude,
            longitude: new.longitude,
            captured_at: new.captured_at,
        };
        tables.locations.push(StoredLocation {
            sample: sample.clone(),
            day_bucket: new.day_bucket,
            daily_limited: new.daily_limited,
        });
        Ok(sample)
    }

    async fn latest_location(&self, owner_user_id: i64) -> Result<Option<LocationSample>, StoreError> {
        Ok(self
            .tables()
            .locations
            .iter()
            .map(|l| &l.sample)
            .filter(|s| s.owner_user_id == owner_user_id)
            .max_by_key(|s| (s.captured_at, s.id))
            .cloned())
    }

    async fn latest_locations_excluding(
        &self,
        viewer_user_id: i64,
        excluded: &[i64],
        band: LatitudeBand,
    ) -> Result<Vec<LocationSample>, StoreError> {
        let tables = self.tables();
        let mut latest: HashMap<i64, &LocationSample> = HashMap::new();
        for sample in tables.locations.iter().map(|l| &l.sample) {
            if sample.owner_user_id == viewer_user_id || excluded.contains(&sample.owner_user_id) {
                continue;
            }
            let entry = latest.entry(sample.owner_user_id).or_insert(sample);
            if (sample.captured_at, sample.id) > (entry.captured_at, entry.id) {
                *entry = sample;
            }
        }
        Ok(latest
            .into_values()
            .filter(|s| band.contains(s.latitude))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExposureStore for MemoryStore {
    async fn shown_on(&self, viewer_user_id: i64, day: NaiveDate) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .tables()
            .exposures
            .iter()
            .filter(|(viewer, _, d)| *viewer == viewer_user_id && *d == day)
            .map(|(_, shown, _)| *shown)
            .collect())
    }

    async fn insert_exposures(
        &self,
        viewer_user_id: i64,
        shown_user_ids: &[i64],
        day: NaiveDate,
        _shown_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if self.exposures_conflicting.load(Ordering::SeqCst) {
            return Err(StoreError::UniqueViolation("exposure_once_per_day".to_string()));
        }
        let mut tables = self.tables();
        let mut written = 0;
        for shown in shown_user_ids {
            let row = (viewer_user_id, *shown, day);
            if !tables.exposures.contains(&row) {
                tables.exposures.push(row);
                written += 1;
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl SwipeStore for MemoryStore {
    async fn count_swipes_between(
        &self,
        swiper_user_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let count = self
            .tables()
            .swipes
            .iter()
            .filter(|s| s.swiper_user_id == swiper_user_id && s.swiped_at >= from && s.swiped_at < until)
            .count();
        Ok(count as i64)
    }

    async fn latest_swipe_on(
        &self,
        swiper_user_id: i64,
        swiped_user_id: i64,
    ) -> Result<Option<SwipeRecord>, StoreError> {
        Ok(self.tables().latest_on_pair(swiper_user_id, swiped_user_id))
    }

    async fn latest_swipe(&self, swiper_user_id: i64) -> Result<Option<SwipeRecord>, StoreError> {
        let mut found: Vec<SwipeRecord> = self
            .tables()
            .swipes
            .iter()
            .filter(|s| s.swiper_user_id == swiper_user_id)
            .cloned()
            .collect();
        found.sort_by(newest_first);
        Ok(found.into_iter().next())
    }

    async fn apply_swipe(&self, write: SwipeWrite) -> Result<AppliedSwipe, StoreError> {
        // The mutex stands in for the pair lock; writes go to a staged copy
        // that replaces the table only once every statement has succeeded.
        let mut tables = self.tables();
        let own = tables.latest_on_pair(write.swiper_user_id, write.swiped_user_id);
        let reciprocal = tables.latest_on_pair(write.swiped_user_id, write.swiper_user_id);
        let plan = plan_swipe(&write, own.as_ref(), reciprocal.as_ref())?;
        let effect = plan.effect();
        let breaking = self.swipe_transactions_breaking.load(Ordering::SeqCst);
        let broken = || StoreError::Unavailable("connection reset inside transaction".to_string());

        let mut staged = tables.swipes.clone();
        let record = match plan {
            SwipePlan::Keep(record) => return Ok(AppliedSwipe { record, effect }),
            SwipePlan::Record => match write.target {
                SwipeTarget::Fresh => {
                    let record = SwipeRecord {
                        id: tables.next_id(),
                        swiper_user_id: write.swiper_user_id,
                        swiped_user_id: write.swiped_user_id,
                        direction: write.direction,
                        matched: false,
                        redo_count: 0,
                        reapplied: false,
                        swiped_at: write.at,
                    };
                    staged.push(record.clone());
                    record
                }
                SwipeTarget::Reapply { id } => {
                    let record = find_mut(&mut staged, id)?;
                    record.direction = write.direction;
                    record.reapplied = true;
                    record.clone()
                }
            },
            SwipePlan::Match { reciprocal_id } => {
                let reciprocal = find_mut(&mut staged, reciprocal_id)?;
                reciprocal.matched = true;
                reciprocal.redo_count = 0;
                reciprocal.swiped_at = write.at;
                if breaking {
                    return Err(broken());
                }

                match write.target {
                    SwipeTarget::Fresh => {
                        let record = SwipeRecord {
                            id: tables.next_id(),
                            swiper_user_id: write.swiper_user_id,
                            swiped_user_id: write.swiped_user_id,
                            direction: Direction::Right,
                            matched: true,
                            redo_count: 0,
                            reapplied: false,
                            swiped_at: write.at,
                        };
                        staged.push(record.clone());
                        record
                    }
                    SwipeTarget::Reapply { id } => {
                        let record = find_mut(&mut staged, id)?;
                        record.direction = Direction::Right;
                        record.matched = true;
                        record.redo_count = 0;
                        record.reapplied = true;
                        record.swiped_at = write.at;
                        record.clone()
                    }
                }
            }
        };

        if breaking {
            return Err(broken());
        }
        tables.swipes = staged;
        Ok(AppliedSwipe { record, effect })
    }

    async fn mark_redone(&self, id: i64) -> Result<Option<SwipeRecord>, StoreError> {
        let mut tables = self.tables();
        Ok(tables.swipe_mut(id).and_then(|record| {
            (record.redo_count == 0).then(|| {
                record.redo_count = 1;
                record.clone()
            })
        }))
    }

    async fn matched_by(&self, user_id: i64) -> Result<Vec<SwipeRecord>, StoreError> {
        let matched: Vec<SwipeRecord> = self
            .tables()
            .swipes
            .iter()
            .filter(|s| s.swiper_user_id == user_id && s.matched)
            .cloned()
            .collect();
        Ok(latest_per(matched, |s| s.swiped_user_id))
    }

    async fn liked_by_others(&self, user_id: i64) -> Result<Vec<SwipeRecord>, StoreError> {
        let liked: Vec<SwipeRecord> = self
            .tables()
            .swipes
            .iter()
            .filter(|s| s.swiped_user_id == user_id && s.direction == Direction::Right && !s.matched)
            .cloned()
            .collect();
        Ok(latest_per(liked, |s| s.swiper_user_id))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn profile_by_user_id(&self, user_id: i64) -> Result<Option<Profile>, StoreError> {
        if self.profiles_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("profile store offline".to_string()));
        }
        Ok(self.tables().profiles.get(&user_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Duration)>>,
    failing: AtomicBool,
}

impl MemoryCache {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, (Vec<u8>, Duration)>> {
        self.entries.lock().expect("cache mutex")
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries().get(key).map(|(bytes, _)| bytes.clone())
    }

    pub fn put_raw(&self, key: &str, value: &[u8]) {
        self.entries().insert(key.to_string(), (value.to_vec(), TEST_TTL));
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.check()?;
        self.entries().insert(key.to_string(), (value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// One store, one cache and one clock, with services wired over them.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub clock: Arc<MutableClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            cache: Arc::new(MemoryCache::default()),
            clock: fixture_clock(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    fn cache_aside(&self) -> CacheAside {
        CacheAside::new(self.cache.clone(), TEST_TTL)
    }

    pub fn locations(&self) -> LocationService {
        LocationService::new(self.store.clone(), self.cache_aside(), self.clock.clone(), DayBuckets::utc())
    }

    pub fn exposures(&self) -> ExposureLedger {
        ExposureLedger::new(self.store.clone(), self.clock.clone(), DayBuckets::utc())
    }

    pub fn search(&self) -> ProximitySearch {
        ProximitySearch::new(
            self.locations(),
            self.store.clone(),
            self.store.clone(),
            self.exposures(),
        )
    }

    pub fn swipes(&self) -> SwipeEngine {
        SwipeEngine::new(
            self.store.clone(),
            self.store.clone(),
            self.cache_aside(),
            self.clock.clone(),
            DayBuckets::utc(),
        )
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            Arc::new(JwtIdentity::new(TEST_JWT_SECRET)),
            Backends {
                locations: self.store.clone(),
                exposures: self.store.clone(),
                swipes: self.store.clone(),
                profiles: self.store.clone(),
                cache: self.cache.clone(),
                cache_ttl: TEST_TTL,
                clock: self.clock.clone(),
                days: DayBuckets::utc(),
            },
        )
    }
}
