mod auth;
mod cache;
mod config;
mod day_bucket;
mod db;
mod discovery;
mod errors;
mod extract;
mod models;
mod routes;
mod state;
mod store;
mod swipes;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mockable::DefaultClock;

use crate::auth::JwtIdentity;
use crate::cache::redis_cache::RedisCache;
use crate::cache::{KvCache, NoOpCache};
use crate::config::Config;
use crate::day_bucket::DayBuckets;
use crate::db::{create_pool, run_migrations};
use crate::routes::build_router;
use crate::state::{AppState, Backends};
use crate::store::postgres::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting matchmaker v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&db).await?;
    let store = Arc::new(PgStore::new(db));

    // Initialize Redis; the service keeps running on the database alone if it is down
    let cache: Arc<dyn KvCache> = match RedisCache::connect(&config.redis_url).await {
        Ok(redis) => Arc::new(redis),
        Err(e) => {
            warn!("Redis unavailable ({e}); continuing with a no-op cache");
            Arc::new(NoOpCache)
        }
    };

    let days = DayBuckets::new(config.day_bucket_offset_minutes)?;
    info!(
        "Day buckets use UTC{:+}min, cache TTL {}s",
        config.day_bucket_offset_minutes, config.cache_ttl_secs
    );

    // Build app state
    let state = AppState::new(
        Arc::new(JwtIdentity::new(&config.jwt_secret)),
        Backends {
            locations: store.clone(),
            exposures: store.clone(),
            swipes: store.clone(),
            profiles: store,
            cache,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            clock: Arc::new(DefaultClock),
            days,
        },
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
