use std::time::Duration;

use rescuelink_core::{AppConfig, MatchOptions, Provider};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub drift_threshold_km: f64,
    pub match_options: MatchOptions,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            drift_threshold_km: 5.0,
            match_options: MatchOptions::default(),
        }
    }
}

impl CacheSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.cache_ttl_secs),
            drift_threshold_km: config.drift_threshold_km,
            match_options: MatchOptions {
                max_distance_km: config.max_distance_km,
                limit: config.result_limit,
                ..MatchOptions::default()
            },
        }
    }

    /// Serve `helpline` wherever the built-in national helpline would go.
    #[must_use]
    pub fn with_helpline(mut self, helpline: Provider) -> Self {
        self.match_options.fallback = helpline;
        self
    }

    pub(crate) fn helpline(&self) -> &Provider {
        &self.match_options.fallback
    }
}
