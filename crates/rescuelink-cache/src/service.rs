//! Caller-facing surface over the cache, position provider, and catalog.

use std::sync::Arc;

use rescuelink_core::{CoveredCity, MatchCriteria, ProviderCatalog, RecommendationSet};
use rescuelink_geo::GeoPositionProvider;

use crate::cache::RecommendationCache;

pub struct RecommendationService {
    cache: RecommendationCache,
    geo: Arc<GeoPositionProvider>,
    catalog: Option<Arc<ProviderCatalog>>,
}

impl RecommendationService {
    #[must_use]
    pub fn new(
        cache: RecommendationCache,
        geo: Arc<GeoPositionProvider>,
        catalog: Option<Arc<ProviderCatalog>>,
    ) -> Self {
        Self {
            cache,
            geo,
            catalog,
        }
    }

    pub async fn get_recommendations(
        &self,
        criteria: &MatchCriteria,
        force_refresh: bool,
    ) -> Arc<RecommendationSet> {
        self.cache.get(criteria, force_refresh).await
    }

    /// Pin the caller to a typed location and return recommendations for it.
    ///
    /// The pinned position replaces device acquisition for this and later
    /// refreshes until [`clear_cache`](Self::clear_cache). Blank text removes
    /// the pin and refreshes from the device instead.
    pub async fn update_manual_location(
        &self,
        text: &str,
        criteria: &MatchCriteria,
    ) -> Arc<RecommendationSet> {
        if text.trim().is_empty() {
            tracing::info!("manual location cleared");
            self.cache.clear();
        } else {
            let position = self.geo.manual(text);
            tracing::info!(
                location = %position.address().formatted,
                city = position.city().unwrap_or("unknown"),
                "manual location set"
            );
            self.cache.set_manual_override(position);
        }
        self.cache.get(criteria, true).await
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cities the static catalog has providers for, alphabetically.
    #[must_use]
    pub fn covered_cities(&self) -> Vec<CoveredCity> {
        self.catalog
            .as_deref()
            .map(ProviderCatalog::covered_cities)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn cached(&self) -> Option<Arc<RecommendationSet>> {
        self.cache.cached()
    }

    #[must_use]
    pub fn cache(&self) -> &RecommendationCache {
        &self.cache
    }
}
