use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgExecutor, PgPool};

use super::{plan_swipe, ExposureStore, LocationStore, ProfileStore, StoreError, SwipePlan, SwipeStore};
use crate::discovery::geo::LatitudeBand;
use crate::models::location::{LocationSample, NewLocation};
use crate::models::profile::Profile;
use crate::models::swipe::{AppliedSwipe, SwipeRecord, SwipeTarget, SwipeWrite};

const SWIPE_COLUMNS: &str =
    "id, swiper_user_id, swiped_user_id, direction, matched, redo_count, reapplied, swiped_at";

/// Latest record `swiper_user_id` holds on `swiped_user_id`.
async fn latest_on_pair<'e, E: PgExecutor<'e>>(
    executor: E,
    swiper_user_id: i64,
    swiped_user_id: i64,
) -> Result<Option<SwipeRecord>, sqlx::Error> {
    sqlx::query_as::<_, SwipeRecord>(&format!(
        r#"
        SELECT {SWIPE_COLUMNS} FROM swipe_records
        WHERE swiper_user_id = $1 AND swiped_user_id = $2
        ORDER BY swiped_at DESC, id DESC
        LIMIT 1
        "#
    ))
    .bind(swiper_user_id)
    .bind(swiped_user_id)
    .fetch_optional(executor)
    .await
}

/// PostgreSQL adapter for every store port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationStore for PgStore {
    async fn insert_location(&self, new: NewLocation) -> Result<LocationSample, StoreError> {
        Ok(sqlx::query_as::<_, LocationSample>(
            r#"
            INSERT INTO location_samples
                (owner_user_id, latitude, longitude, captured_at, day_bucket, daily_limited)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, owner_user_id, latitude, longitude, captured_at
            "#,
        )
        .bind(new.owner_user_id)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(new.captured_at)
        .bind(new.day_bucket)
        .bind(new.daily_limited)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn latest_location(&self, owner_user_id: i64) -> Result<Option<LocationSample>, StoreError> {
        Ok(sqlx::query_as::<_, LocationSample>(
            r#"
            SELECT id, owner_user_id, latitude, longitude, captured_at
            FROM location_samples
            WHERE owner_user_id = $1
            ORDER BY captured_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(owner_user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn latest_locations_excluding(
        &self,
        viewer_user_id: i64,
        excluded: &[i64],
        band: LatitudeBand,
    ) -> Result<Vec<LocationSample>, StoreError> {
        // The band applies to each owner's latest sample, never to history.
        Ok(sqlx::query_as::<_, LocationSample>(
            r#"
            SELECT id, owner_user_id, latitude, longitude, captured_at
            FROM (
                SELECT DISTINCT ON (owner_user_id)
                    id, owner_user_id, latitude, longitude, captured_at
                FROM location_samples
                WHERE owner_user_id <> $1
                  AND NOT (owner_user_id = ANY($2))
                ORDER BY owner_user_id, captured_at DESC, id DESC
            ) latest
            WHERE latitude BETWEEN $3 AND $4
            "#,
        )
        .bind(viewer_user_id)
        .bind(excluded)
        .bind(band.min_latitude)
        .bind(band.max_latitude)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl ExposureStore for PgStore {
    async fn shown_on(&self, viewer_user_id: i64, day: NaiveDate) -> Result<Vec<i64>, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT shown_user_id FROM exposure_records WHERE viewer_user_id = $1 AND day_bucket = $2",
        )
        .bind(viewer_user_id)
        .bind(day)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_exposures(
        &self,
        viewer_user_id: i64,
        shown_user_ids: &[i64],
        day: NaiveDate,
        shown_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO exposure_records (viewer_user_id, shown_user_id, shown_at, day_bucket)
            SELECT $1, shown, $3, $4
            FROM UNNEST($2::BIGINT[]) AS shown
            ON CONFLICT ON CONSTRAINT exposure_once_per_day DO NOTHING
            "#,
        )
        .bind(viewer_user_id)
        .bind(shown_user_ids)
        .bind(shown_at)
        .bind(day)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SwipeStore for PgStore {
    async fn count_swipes_between(
        &self,
        swiper_user_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM swipe_records
            WHERE swiper_user_id = $1 AND swiped_at >= $2 AND swiped_at < $3
            "#,
        )
        .bind(swiper_user_id)
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn latest_swipe_on(
        &self,
        swiper_user_id: i64,
        swiped_user_id: i64,
    ) -> Result<Option<SwipeRecord>, StoreError> {
        Ok(latest_on_pair(&self.pool, swiper_user_id, swiped_user_id).await?)
    }

    async fn latest_swipe(&self, swiper_user_id: i64) -> Result<Option<SwipeRecord>, StoreError> {
        Ok(sqlx::query_as::<_, SwipeRecord>(&format!(
            r#"
            SELECT {SWIPE_COLUMNS} FROM swipe_records
            WHERE swiper_user_id = $1
            ORDER BY swiped_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(swiper_user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn apply_swipe(&self, write: SwipeWrite) -> Result<AppliedSwipe, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes every writer on this unordered pair until commit.
        sqlx::query(
            r#"
            SELECT pg_advisory_xact_lock(
                hashtextextended(LEAST($1, $2)::TEXT || ':' || GREATEST($1, $2)::TEXT, 0)
            )
            "#,
        )
        .bind(write.swiper_user_id)
        .bind(write.swiped_user_id)
        .execute(&mut *tx)
        .await?;

        let own = latest_on_pair(&mut *tx, write.swiper_user_id, write.swiped_user_id).await?;
        let reciprocal = latest_on_pair(&mut *tx, write.swiped_user_id, write.swiper_user_id).await?;

        let plan = match plan_swipe(&write, own.as_ref(), reciprocal.as_ref()) {
            Ok(plan) => plan,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        let effect = plan.effect();

        let record = match plan {
            SwipePlan::Keep(record) => record,
            SwipePlan::Record => match write.target {
                SwipeTarget::Fresh => {
                    sqlx::query_as::<_, SwipeRecord>(&format!(
                        r#"
                        INSERT INTO swipe_records
                            (swiper_user_id, swiped_user_id, direction, matched, redo_count, swiped_at)
                        VALUES ($1, $2, $3, FALSE, 0, $4)
                        RETURNING {SWIPE_COLUMNS}
                        "#
                    ))
                    .bind(write.swiper_user_id)
                    .bind(write.swiped_user_id)
                    .bind(write.direction)
                    .bind(write.at)
                    .fetch_one(&mut *tx)
                    .await?
                }
                SwipeTarget::Reapply { id } => {
                    sqlx::query_as::<_, SwipeRecord>(&format!(
                        r#"
                        UPDATE swipe_records SET direction = $2, reapplied = TRUE
                        WHERE id = $1 AND redo_count = 1 AND NOT reapplied
                        RETURNING {SWIPE_COLUMNS}
                        "#
                    ))
                    .bind(id)
                    .bind(write.direction)
                    .fetch_one(&mut *tx)
                    .await?
                }
            },
            SwipePlan::Match { reciprocal_id } => {
                sqlx::query(
                    r#"
                    UPDATE swipe_records
                    SET matched = TRUE, redo_count = 0, swiped_at = $2
                    WHERE id = $1
                    "#,
                )
                .bind(reciprocal_id)
                .bind(write.at)
                .execute(&mut *tx)
                .await?;

                match write.target {
                    SwipeTarget::Fresh => {
                        sqlx::query_as::<_, SwipeRecord>(&format!(
                            r#"
                            INSERT INTO swipe_records
                                (swiper_user_id, swiped_user_id, direction, matched, redo_count, swiped_at)
                            VALUES ($1, $2, 'right', TRUE, 0, $3)
                            RETURNING {SWIPE_COLUMNS}
                            "#
                        ))
                        .bind(write.swiper_user_id)
                        .bind(write.swiped_user_id)
                        .bind(write.at)
                        .fetch_one(&mut *tx)
                        .await?
                    }
                    SwipeTarget::Reapply { id } => {
                        sqlx::query_as::<_, SwipeRecord>(&format!(
                            r#"
                            UPDATE swipe_records
                            SET direction = 'right', matched = TRUE, redo_count = 0,
                                reapplied = TRUE, swiped_at = $2
                            WHERE id = $1
                            RETURNING {SWIPE_COLUMNS}
                            "#
                        ))
                        .bind(id)
                        .bind(write.at)
                        .fetch_one(&mut *tx)
                        .await?
                    }
                }
            }
        };

        tx.commit().await?;
        Ok(AppliedSwipe { record, effect })
    }

    async fn mark_redone(&self, id: i64) -> Result<Option<SwipeRecord>, StoreError> {
        Ok(sqlx::query_as::<_, SwipeRecord>(&format!(
            r#"
            UPDATE swipe_records SET redo_count = redo_count + 1
            WHERE id = $1 AND redo_count = 0
            RETURNING {SWIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn matched_by(&self, user_id: i64) -> Result<Vec<SwipeRecord>, StoreError> {
        Ok(sqlx::query_as::<_, SwipeRecord>(&format!(
            r#"
            SELECT {SWIPE_COLUMNS} FROM (
                SELECT DISTINCT ON (swiped_user_id) {SWIPE_COLUMNS}
                FROM swipe_records
                WHERE swiper_user_id = $1 AND matched
                ORDER BY swiped_user_id, swiped_at DESC, id DESC
            ) pairs
            ORDER BY swiped_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn liked_by_others(&self, user_id: i64) -> Result<Vec<SwipeRecord>, StoreError> {
        Ok(sqlx::query_as::<_, SwipeRecord>(&format!(
            r#"
            SELECT {SWIPE_COLUMNS} FROM (
                SELECT DISTINCT ON (swiper_user_id) {SWIPE_COLUMNS}
                FROM swipe_records
                WHERE swiped_user_id = $1 AND direction = 'right' AND NOT matched
                ORDER BY swiper_user_id, swiped_at DESC, id DESC
            ) liked
            ORDER BY swiped_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn profile_by_user_id(&self, user_id: i64) -> Result<Option<Profile>, StoreError> {
        Ok(sqlx::query_as::<_, Profile>(
            r#"
            SELECT profile_id, user_id, about_me, photos, interests, relationship_goals,
                   height, language, zodiac_sign, education_details
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
