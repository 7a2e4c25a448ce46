//! Domain types, configuration, and pure ranking logic for rescuelink.
//!
//! Nothing in this crate performs I/O beyond reading the provider catalog
//! file and the process environment.

pub mod app_config;
pub mod catalog;
pub mod config;
pub mod geo;
pub mod matcher;
pub mod provider;
pub mod types;

pub use app_config::{AppConfig, DeviceFixConfig, Environment};
pub use catalog::{load_catalog, CoveredCity, ProviderCatalog};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{
    distance_label, estimate_centroid, extract_city, haversine_km, normalize_city,
    CentroidEstimate, DEFAULT_CITY, EARTH_RADIUS_KM,
};
pub use matcher::{rank_providers, MatchOptions, MatchOutcome, DEFAULT_MAX_DISTANCE_KM};
pub use provider::{
    fallback_provider, local_animal_control, stable_provider_id, Provider, ProviderOrigin,
    RankedProvider, RawCoordinates, RawProvider,
};
pub use types::{
    Address, Coordinates, Guidance, MatchCriteria, Position, PositionSource, RecommendationSet,
    UrgencyTier,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read provider catalog {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse provider catalog: {0}")]
    CatalogFileParse(#[from] serde_yaml::Error),

    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid device fix: {0}")]
    InvalidFix(String),

    #[error("unknown urgency tier: {0}")]
    UnknownUrgency(String),
}
