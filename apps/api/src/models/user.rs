use serde::{Deserialize, Serialize};

/// Subscription tier carried in the caller's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    /// Anything other than an exact "Premium" is treated as the free tier.
    pub fn from_claim(value: Option<&str>) -> Self {
        match value {
            Some("Premium") => Tier::Premium,
            _ => Tier::Free,
        }
    }

    pub fn is_premium(self) -> bool {
        matches!(self, Tier::Premium)
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub tier: Tier,
}
