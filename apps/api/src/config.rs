use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub rust_log: String,
    /// UTC offset of the reference timezone that defines a "day" for daily rules.
    pub day_bucket_offset_minutes: i32,
    pub cache_ttl_secs: u64,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            jwt_secret: require_env("JWT_SECRET")?,
            port: optional_env("PORT", "8080")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            day_bucket_offset_minutes: optional_env("DAY_BUCKET_UTC_OFFSET_MINUTES", "0")?,
            cache_ttl_secs: optional_env("CACHE_TTL_SECS", "86400")?,
            db_max_connections: optional_env("DB_MAX_CONNECTIONS", "10")?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.day_bucket_offset_minutes.abs() >= 24 * 60 {
            bail!("DAY_BUCKET_UTC_OFFSET_MINUTES must be within ±1439");
        }
        if self.cache_ttl_secs == 0 {
            bail!("CACHE_TTL_SECS must be positive");
        }
        if self.jwt_secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value"))
}
