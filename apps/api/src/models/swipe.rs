use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "swipe_direction", rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRecord {
    pub id: i64,
    pub swiper_user_id: i64,
    pub swiped_user_id: i64,
    pub direction: Direction,
    #[serde(rename = "isMatched")]
    pub matched: bool,
    /// 0 while the swipe can still be redone, 1 once it has been.
    pub redo_count: i32,
    /// Set once a redone swipe has been submitted again.
    #[serde(default)]
    pub reapplied: bool,
    #[serde(rename = "timestamp")]
    pub swiped_at: DateTime<Utc>,
}

/// Which record a swipe lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeTarget {
    /// Append a new record.
    Fresh,
    /// Rewrite a redone record in place.
    Reapply { id: i64 },
}

/// A swipe to persist. The store decides match or no match against the
/// pair's state at write time.
#[derive(Debug, Clone, Copy)]
pub struct SwipeWrite {
    pub swiper_user_id: i64,
    pub swiped_user_id: i64,
    pub direction: Direction,
    pub target: SwipeTarget,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeEffect {
    /// Stored without a match.
    Recorded,
    /// Both records of the pair were flipped to matched.
    Matched,
    /// The pair was already matched; nothing was written.
    AlreadyMatched,
}

#[derive(Debug, Clone)]
pub struct AppliedSwipe {
    pub record: SwipeRecord,
    pub effect: SwipeEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Users the caller has matched with.
    All,
    /// Users who swiped right on the caller and are still waiting.
    Liked,
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(MatchType::All),
            "liked" => Ok(MatchType::Liked),
            other => Err(format!("invalid match type '{other}', expected 'all' or 'liked'")),
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::All => f.write_str("all"),
            MatchType::Liked => f.write_str("liked"),
        }
    }
}
