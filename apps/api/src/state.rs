use std::sync::Arc;
use std::time::Duration;

use crate::auth::IdentityProvider;
use crate::cache::{CacheAside, KvCache};
use crate::day_bucket::{DayBuckets, SharedClock};
use crate::discovery::exposure::ExposureLedger;
use crate::discovery::locations::LocationService;
use crate::discovery::search::ProximitySearch;
use crate::store::{ExposureStore, LocationStore, ProfileStore, SwipeStore};
use crate::swipes::engine::SwipeEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub locations: LocationService,
    pub search: ProximitySearch,
    pub swipes: SwipeEngine,
}

/// Everything the services are wired from.
pub struct Backends {
    pub locations: Arc<dyn LocationStore>,
    pub exposures: Arc<dyn ExposureStore>,
    pub swipes: Arc<dyn SwipeStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub cache: Arc<dyn KvCache>,
    pub cache_ttl: Duration,
    pub clock: SharedClock,
    pub days: DayBuckets,
}

impl AppState {
    pub fn new(identity: Arc<dyn IdentityProvider>, backends: Backends) -> Self {
        let Backends {
            locations: location_store,
            exposures,
            swipes,
            profiles,
            cache,
            cache_ttl,
            clock,
            days,
        } = backends;
        let cache = CacheAside::new(cache, cache_ttl);

        let locations = LocationService::new(location_store.clone(), cache.clone(), clock.clone(), days);
        let ledger = ExposureLedger::new(exposures, clock.clone(), days);
        let search = ProximitySearch::new(locations.clone(), location_store, profiles.clone(), ledger);
        let swipes = SwipeEngine::new(swipes, profiles, cache, clock, days);

        Self {
            identity,
            locations,
            search,
            swipes,
        }
    }
}
