//! Candidate generator that serves the static provider catalog.

use std::sync::Arc;

use async_trait::async_trait;
use rescuelink_core::{MatchCriteria, Position, Provider, ProviderCatalog};

use crate::error::GeneratorError;
use crate::{CandidateBatch, CandidateGenerator};

pub struct CatalogGenerator {
    catalog: Arc<ProviderCatalog>,
    /// Radius for snapping a position to the nearest covered city.
    max_distance_km: f64,
}

impl CatalogGenerator {
    #[must_use]
    pub fn new(catalog: Arc<ProviderCatalog>, max_distance_km: f64) -> Self {
        Self {
            catalog,
            max_distance_km,
        }
    }

    /// Providers for the position's own city, else for the nearest covered
    /// city within the radius.
    fn providers_near(&self, position: &Position) -> Option<&[Provider]> {
        position
            .city()
            .and_then(|city| self.catalog.providers_for(city))
            .or_else(|| {
                let coordinates = position.coordinates()?;
                let nearest = self.catalog.nearest_city(coordinates, self.max_distance_km)?;
                tracing::debug!(city = nearest, "snapped position to nearest covered city");
                self.catalog.providers_for(nearest)
            })
    }
}

#[async_trait]
impl CandidateGenerator for CatalogGenerator {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn generate(
        &self,
        position: Option<&Position>,
        _criteria: &MatchCriteria,
    ) -> Result<CandidateBatch, GeneratorError> {
        let position = position.ok_or(GeneratorError::NoPosition)?;

        let providers = self
            .providers_near(position)
            .ok_or_else(|| GeneratorError::NotCovered(position.address().formatted.clone()))?
            .to_vec();

        tracing::debug!(providers = providers.len(), "serving catalog providers");
        Ok(CandidateBatch {
            providers,
            guidance: None,
        })
    }
}
