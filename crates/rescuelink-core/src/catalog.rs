//! Static provider catalog, keyed by city.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::geo::{estimate_centroid, haversine_km, normalize_city};
use crate::provider::{fallback_provider, Provider, ProviderOrigin, RawProvider};
use crate::types::Coordinates;
use crate::ConfigError;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    cities: BTreeMap<String, Vec<RawProvider>>,
    #[serde(default)]
    default_provider: Option<RawProvider>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveredCity {
    pub city: String,
    pub provider_count: usize,
}

impl CoveredCity {
    /// City name with its first letter upper-cased.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut chars = self.city.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().collect::<String>() + chars.as_str()
        })
    }
}

/// Read-only provider dataset.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    cities: BTreeMap<String, Vec<Provider>>,
    default_provider: Provider,
}

impl ProviderCatalog {
    /// Parse and validate a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CatalogFileParse`] for malformed YAML and
    /// [`ConfigError::Validation`] for records that fail validation.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_yaml::from_str(content)?;
        validate_catalog(&file)?;

        let mut cities = BTreeMap::new();
        for (city, raws) in file.cities {
            let providers: Vec<Provider> = raws
                .into_iter()
                .filter_map(|raw| raw.normalize(ProviderOrigin::Catalog))
                .map(|mut p| {
                    p.city.get_or_insert_with(|| city.to_lowercase());
                    p
                })
                .collect();
            cities.insert(normalize_city(&city), providers);
        }

        let default_provider = file
            .default_provider
            .and_then(|raw| raw.normalize(ProviderOrigin::Builtin))
            .unwrap_or_else(fallback_provider);

        Ok(Self {
            cities,
            default_provider,
        })
    }

    /// Providers registered for `city`. Aliases resolve ("Bombay" → mumbai).
    #[must_use]
    pub fn providers_for(&self, city: &str) -> Option<&[Provider]> {
        self.cities
            .get(&normalize_city(city))
            .map(Vec::as_slice)
            .filter(|list| !list.is_empty())
    }

    /// The covered city whose centroid is closest to `point`, within `max_km`.
    #[must_use]
    pub fn nearest_city(&self, point: Coordinates, max_km: f64) -> Option<&str> {
        self.cities
            .keys()
            .filter_map(|city| {
                let estimate = estimate_centroid(city);
                estimate
                    .matched
                    .then(|| (city.as_str(), haversine_km(point, estimate.coordinates)))
            })
            .filter(|(_, d)| *d <= max_km)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(city, _)| city)
    }

    #[must_use]
    pub fn covered_cities(&self) -> Vec<CoveredCity> {
        self.cities
            .iter()
            .map(|(city, providers)| CoveredCity {
                city: city.clone(),
                provider_count: providers.len(),
            })
            .collect()
    }

    #[must_use]
    pub fn default_provider(&self) -> &Provider {
        &self.default_provider
    }
}

/// Load and validate the provider catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<ProviderCatalog, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog = ProviderCatalog::from_yaml_str(&content)?;
    tracing::debug!(
        path = %path.display(),
        cities = catalog.cities.len(),
        "loaded provider catalog"
    );
    Ok(catalog)
}

fn validate_catalog(file: &CatalogFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();
    let mut seen_cities = HashSet::new();

    for (city, providers) in &file.cities {
        if city.trim().is_empty() {
            return Err(ConfigError::Validation(
                "city key must be non-empty".to_string(),
            ));
        }

        let canonical = normalize_city(city);
        if !seen_cities.insert(canonical.clone()) {
            return Err(ConfigError::Validation(format!(
                "city '{city}' resolves to '{canonical}', which is already listed"
            )));
        }

        for provider in providers {
            let name = provider.name.as_deref().unwrap_or("").trim();
            if name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "provider in '{city}' has an empty name"
                )));
            }

            if provider.phone.as_deref().unwrap_or("").trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "provider '{name}' in '{city}' has no phone number"
                )));
            }

            if let Some(rating) = provider.rating {
                if !(0.0..=5.0).contains(&rating) {
                    return Err(ConfigError::Validation(format!(
                        "provider '{name}' has rating {rating}; must be between 0 and 5"
                    )));
                }
            }

            if let Some(id) = provider.id.as_deref() {
                if !seen_ids.insert(id.to_string()) {
                    return Err(ConfigError::Validation(format!(
                        "duplicate provider id: '{id}'"
                    )));
                }
            }
        }
    }

    Ok(())
}
