//! Builds a [`RecommendationService`] from [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use rescuelink_cache::{CacheSettings, RecommendationCache, RecommendationService};
use rescuelink_core::{load_catalog, AppConfig, ProviderCatalog};
use rescuelink_generator::{
    CandidateGenerator, CatalogGenerator, ChainedGenerator, OpenAiGenerator, OpenAiSettings,
};
use rescuelink_geo::{
    BigDataCloudGeocoder, DeviceFix, DeviceLocator, GeoPositionProvider, GeoSettings, HttpLocator,
    StaticLocator,
};

/// Per-invocation adjustments to the configured match options.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MatchOverrides {
    pub max_distance_km: Option<f64>,
    pub limit: Option<usize>,
}

/// Wire locator, geocoder, generator and cache for one CLI invocation.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built or if neither an
/// `OpenAI` key nor a readable provider catalog is available.
pub(crate) fn build_service(
    config: &AppConfig,
    overrides: MatchOverrides,
) -> anyhow::Result<RecommendationService> {
    let mut settings = CacheSettings::from_config(config);
    if let Some(km) = overrides.max_distance_km {
        if !km.is_finite() || km < 0.0 {
            anyhow::bail!("--max-distance must be a non-negative number, got {km}");
        }
        settings.match_options.max_distance_km = km;
    }
    if let Some(limit) = overrides.limit {
        if limit == 0 {
            anyhow::bail!("--limit must be at least 1");
        }
        settings.match_options.limit = Some(limit);
    }

    let geo = Arc::new(build_geo(config)?);
    let catalog = open_catalog(config);
    if let Some(catalog) = &catalog {
        settings = settings.with_helpline(catalog.default_provider().clone());
    }
    let generator = build_generator(
        config,
        catalog.clone(),
        settings.match_options.max_distance_km,
    )?;
    tracing::info!(
        generator = generator.name(),
        catalog = catalog.is_some(),
        limit = ?settings.match_options.limit,
        env = %config.env,
        "recommendation service ready"
    );

    let cache = RecommendationCache::new(Arc::clone(&geo), generator, settings);
    Ok(RecommendationService::new(cache, geo, catalog))
}

fn build_geo(config: &AppConfig) -> anyhow::Result<GeoPositionProvider> {
    let timeout = Duration::from_secs(config.position_timeout_secs);
    let locator: Arc<dyn DeviceLocator> = if let Some(fix) = config.device_fix {
        Arc::new(StaticLocator::new(Some(DeviceFix::from(fix))))
    } else if let Some(url) = config.ip_locator_url.as_deref() {
        Arc::new(HttpLocator::new(url, timeout)?)
    } else {
        Arc::new(StaticLocator::denied())
    };
    let geocoder = Arc::new(BigDataCloudGeocoder::with_base_url(
        &config.geocoder_url,
        timeout,
    )?);

    Ok(GeoPositionProvider::new(
        locator,
        geocoder,
        GeoSettings {
            timeout,
            max_age: Duration::from_secs(config.position_max_age_secs),
            default_region: config.default_region.clone(),
        },
    ))
}

fn open_catalog(config: &AppConfig) -> Option<Arc<ProviderCatalog>> {
    match load_catalog(&config.catalog_path) {
        Ok(catalog) => Some(Arc::new(catalog)),
        Err(e) => {
            tracing::warn!(
                path = %config.catalog_path.display(),
                error = %e,
                "provider catalog unavailable"
            );
            None
        }
    }
}

fn build_generator(
    config: &AppConfig,
    catalog: Option<Arc<ProviderCatalog>>,
    max_distance_km: f64,
) -> anyhow::Result<Arc<dyn CandidateGenerator>> {
    let catalog_generator = catalog.map(|catalog| {
        Arc::new(CatalogGenerator::new(catalog, max_distance_km)) as Arc<dyn CandidateGenerator>
    });
    let openai = OpenAiSettings::from_config(config)
        .map(OpenAiGenerator::new)
        .transpose()?
        .map(|generator| Arc::new(generator) as Arc<dyn CandidateGenerator>);

    match (openai, catalog_generator) {
        (Some(primary), Some(secondary)) => {
            Ok(Arc::new(ChainedGenerator::new(primary, secondary)))
        }
        (Some(generator), None) | (None, Some(generator)) => Ok(generator),
        (None, None) => anyhow::bail!(
            "no provider source: set OPENAI_API_KEY or provide a catalog at {}",
            config.catalog_path.display()
        ),
    }
}
