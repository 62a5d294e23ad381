use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One shared position of a user. Samples are append-only; the most recent
/// one is the user's current location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub id: i64,
    pub owner_user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

/// Insert payload for a location sample.
#[derive(Debug, Clone)]
pub struct NewLocation {
    pub owner_user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
    pub day_bucket: NaiveDate,
    /// Limited rows are unique per (owner, day_bucket) at the storage level.
    pub daily_limited: bool,
}
