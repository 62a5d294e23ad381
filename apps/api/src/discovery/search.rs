//! Proximity search.
//!
//! Algorithm:
//! 1. Resolve the viewer's current location (cache-aside).
//! 2. Load the viewer's exposures for today's bucket.
//! 3. Scan the latest sample of every other user not yet shown today, limited
//!    to the latitude band that can fall within the radius.
//! 4. Keep samples within `max_distance_km` (haversine).
//! 5. Order by sample recency, newest first, then page.
//! 6. Record every returned candidate as shown, then attach profiles.
//!
//! Ordering is by recency rather than distance so that recently active users
//! surface first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::discovery::exposure::ExposureLedger;
use crate::discovery::geo::{haversine_km, Coordinates, LatitudeBand};
use crate::discovery::locations::LocationService;
use crate::errors::AppError;
use crate::models::location::LocationSample;
use crate::models::profile::Profile;
use crate::store::{profile_best_effort, LocationStore, ProfileStore};

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyRequest {
    pub max_distance: f64,
    pub page: i64,
    pub page_size: i64,
}

/// A validated search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub max_distance_km: f64,
    pub page: usize,
    pub page_size: usize,
}

impl NearbyQuery {
    pub fn new(max_distance_km: f64, page: i64, page_size: i64) -> Result<Self, AppError> {
        if !max_distance_km.is_finite() || max_distance_km <= 0.0 {
            return Err(AppError::Validation(
                "maxDistance must be a positive number of kilometres".to_string(),
            ));
        }
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::Validation(format!(
                "pageSize must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self {
            max_distance_km,
            page: usize::try_from(page).unwrap_or(usize::MAX),
            page_size: usize::try_from(page_size).unwrap_or(1),
        })
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl TryFrom<NearbyRequest> for NearbyQuery {
    type Error = AppError;

    fn try_from(req: NearbyRequest) -> Result<Self, Self::Error> {
        NearbyQuery::new(req.max_distance, req.page, req.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyCandidate {
    pub location_id: i64,
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub distance_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

/// Filters samples to the radius, orders them newest first and cuts one page.
pub fn rank_candidates(
    origin: Coordinates,
    samples: Vec<LocationSample>,
    query: &NearbyQuery,
) -> Vec<(LocationSample, f64)> {
    let mut within: Vec<(LocationSample, f64)> = samples
        .into_iter()
        .filter_map(|sample| {
            let there = Coordinates {
                latitude: sample.latitude,
                longitude: sample.longitude,
            };
            let distance = haversine_km(origin, there);
            (distance <= query.max_distance_km).then_some((sample, distance))
        })
        .collect();

    within.sort_by(|(a, _), (b, _)| {
        b.captured_at
            .cmp(&a.captured_at)
            .then_with(|| a.owner_user_id.cmp(&b.owner_user_id))
    });

    within
        .into_iter()
        .skip(query.offset())
        .take(query.page_size)
        .collect()
}

#[derive(Clone)]
pub struct ProximitySearch {
    locations: LocationService,
    samples: Arc<dyn LocationStore>,
    profiles: Arc<dyn ProfileStore>,
    exposures: ExposureLedger,
}

impl ProximitySearch {
    pub fn new(
        locations: LocationService,
        samples: Arc<dyn LocationStore>,
        profiles: Arc<dyn ProfileStore>,
        exposures: ExposureLedger,
    ) -> Self {
        Self {
            locations,
            samples,
            profiles,
            exposures,
        }
    }

    pub async fn find_nearby(
        &self,
        viewer_user_id: i64,
        query: NearbyQuery,
    ) -> Result<Vec<NearbyCandidate>, AppError> {
        let viewer = self.locations.current_location(viewer_user_id).await?;
        let origin = Coordinates {
            latitude: viewer.latitude,
            longitude: viewer.longitude,
        };

        let (now, today) = self.exposures.today();

        let mut excluded: Vec<i64> = self
            .exposures
            .already_shown_on(viewer_user_id, today)
            .await?
            .into_iter()
            .collect();
        excluded.sort_unstable();

        let band = LatitudeBand::around(origin, query.max_distance_km);
        let samples = self
            .samples
            .latest_locations_excluding(viewer_user_id, &excluded, band)
            .await?;
        let scanned = samples.len();
        let page = rank_candidates(origin, samples, &query);

        let shown: Vec<i64> = page.iter().map(|(s, _)| s.owner_user_id).collect();
        self.exposures
            .record_shown_on(viewer_user_id, &shown, today, now)
            .await?;

        info!(
            "Viewer {viewer_user_id}: {} candidates within {:.1} km (scanned {scanned}, excluded {})",
            page.len(),
            query.max_distance_km,
            excluded.len()
        );

        let profiles = join_all(
            page.iter()
                .map(|(sample, _)| profile_best_effort(self.profiles.as_ref(), sample.owner_user_id)),
        )
        .await;

        Ok(page
            .into_iter()
            .zip(profiles)
            .map(|((sample, distance_km), profile)| NearbyCandidate {
                location_id: sample.id,
                user_id: sample.owner_user_id,
                latitude: sample.latitude,
                longitude: sample.longitude,
                timestamp: sample.captured_at,
                distance_km,
                profile,
            })
            .collect())
    }
}
