use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::models::user::{Identity, Tier};
use crate::state::AppState;

/// Resolves a bearer credential into the calling user and their tier.
pub trait IdentityProvider: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "premiumStatus", default)]
    pub premium_status: Option<String>,
    pub exp: i64,
}

/// HS256 tokens signed with the shared secret.
pub struct JwtIdentity {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentity {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl IdentityProvider for JwtIdentity {
    fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("Rejected token: {e}");
            AppError::Unauthorized
        })?;

        if data.claims.user_id <= 0 {
            return Err(AppError::Unauthorized);
        }

        Ok(Identity {
            user_id: data.claims.user_id,
            tier: Tier::from_claim(data.claims.premium_status.as_deref()),
        })
    }
}

/// Accepts both `Bearer <token>` and a bare token.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let raw = parts.headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        state.identity.verify(token)
    }
}
