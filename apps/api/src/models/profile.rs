use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Display profile owned by the profile service. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub profile_id: i64,
    pub user_id: i64,
    pub about_me: Option<String>,
    pub photos: Value,
    pub interests: Value,
    pub relationship_goals: Option<String>,
    pub height: Option<i32>,
    pub language: Option<String>,
    pub zodiac_sign: Option<String>,
    pub education_details: Option<String>,
}
