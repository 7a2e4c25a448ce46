use std::path::PathBuf;

use crate::types::Coordinates;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// A fixed device position supplied through the environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceFixConfig {
    pub coordinates: Coordinates,
    pub accuracy_meters: f64,
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub catalog_path: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub generator_timeout_secs: u64,
    pub generator_max_retries: u32,
    pub generator_backoff_base_ms: u64,
    pub candidate_count: usize,
    pub geocoder_url: String,
    pub ip_locator_url: Option<String>,
    pub device_fix: Option<DeviceFixConfig>,
    pub default_region: Option<String>,
    pub position_timeout_secs: u64,
    pub position_max_age_secs: u64,
    pub cache_ttl_secs: u64,
    pub drift_threshold_km: f64,
    pub max_distance_km: f64,
    /// Cap on ranked providers per set; `None` returns every match.
    pub result_limit: Option<usize>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("catalog_path", &self.catalog_path)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("generator_timeout_secs", &self.generator_timeout_secs)
            .field("generator_max_retries", &self.generator_max_retries)
            .field("generator_backoff_base_ms", &self.generator_backoff_base_ms)
            .field("candidate_count", &self.candidate_count)
            .field("geocoder_url", &self.geocoder_url)
            .field("ip_locator_url", &self.ip_locator_url)
            .field("device_fix", &self.device_fix)
            .field("default_region", &self.default_region)
            .field("position_timeout_secs", &self.position_timeout_secs)
            .field("position_max_age_secs", &self.position_max_age_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("drift_threshold_km", &self.drift_threshold_km)
            .field("max_distance_km", &self.max_distance_km)
            .field("result_limit", &self.result_limit)
            .finish()
    }
}
