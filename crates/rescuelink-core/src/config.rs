use crate::app_config::{AppConfig, DeviceFixConfig, Environment};
use crate::types::Coordinates;
use crate::ConfigError;

pub const DEFAULT_GEOCODER_URL: &str = "https://api.bigdatacloud.net/data/reverse-geocode-client";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Accuracy reported for a fix pinned through `RESCUELINK_DEVICE_LAT`/`_LNG`.
const PINNED_FIX_ACCURACY_METERS: f64 = 10.0;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load configuration from the process environment without touching `.env`.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default =
        |var: &str, default: &str| -> String { optional(var).unwrap_or_else(|| default.to_string()) };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_km = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(
                var,
                format!("must be a non-negative number of kilometers, got {value}"),
            ));
        }
        Ok(value)
    };

    let parse_degrees = |var: &str| -> Result<Option<f64>, ConfigError> {
        optional(var)
            .map(|raw| raw.parse::<f64>().map_err(|e| invalid(var, e.to_string())))
            .transpose()
    };

    let env = parse_environment(&or_default("RESCUELINK_ENV", "development"))?;
    let log_level = or_default("RESCUELINK_LOG_LEVEL", "info");
    let catalog_path = PathBuf::from(or_default(
        "RESCUELINK_CATALOG_PATH",
        "./config/providers.yaml",
    ));

    let openai_api_key = optional("OPENAI_API_KEY");
    let openai_base_url = or_default("RESCUELINK_OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL);
    let openai_model = or_default("RESCUELINK_OPENAI_MODEL", "gpt-4o-mini");
    let generator_timeout_secs = parse_u64("RESCUELINK_GENERATOR_TIMEOUT_SECS", "30")?;
    let generator_max_retries = parse_u32("RESCUELINK_GENERATOR_MAX_RETRIES", "2")?;
    let generator_backoff_base_ms = parse_u64("RESCUELINK_GENERATOR_BACKOFF_BASE_MS", "500")?;

    let candidate_count = or_default("RESCUELINK_CANDIDATE_COUNT", "5")
        .parse::<usize>()
        .map_err(|e| invalid("RESCUELINK_CANDIDATE_COUNT", e.to_string()))?;
    if candidate_count == 0 {
        return Err(invalid(
            "RESCUELINK_CANDIDATE_COUNT",
            "must be at least 1".to_string(),
        ));
    }

    let geocoder_url = or_default("RESCUELINK_GEOCODER_URL", DEFAULT_GEOCODER_URL);
    let ip_locator_url = optional("RESCUELINK_IP_LOCATOR_URL");

    let device_fix = match (
        parse_degrees("RESCUELINK_DEVICE_LAT")?,
        parse_degrees("RESCUELINK_DEVICE_LNG")?,
    ) {
        (Some(lat), Some(lng)) => {
            let coordinates = Coordinates::new(lat, lng);
            if !coordinates.is_valid() {
                return Err(invalid(
                    "RESCUELINK_DEVICE_LAT",
                    format!("coordinates out of range: {lat}, {lng}"),
                ));
            }
            Some(DeviceFixConfig {
                coordinates,
                accuracy_meters: PINNED_FIX_ACCURACY_METERS,
            })
        }
        (None, None) => None,
        (Some(_), None) => {
            return Err(invalid(
                "RESCUELINK_DEVICE_LNG",
                "must be set together with RESCUELINK_DEVICE_LAT".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(invalid(
                "RESCUELINK_DEVICE_LAT",
                "must be set together with RESCUELINK_DEVICE_LNG".to_string(),
            ));
        }
    };

    let default_region = optional("RESCUELINK_DEFAULT_REGION");
    let position_timeout_secs = parse_u64("RESCUELINK_POSITION_TIMEOUT_SECS", "10")?;
    let position_max_age_secs = parse_u64("RESCUELINK_POSITION_MAX_AGE_SECS", "300")?;
    let cache_ttl_secs = parse_u64("RESCUELINK_CACHE_TTL_SECS", "1800")?;
    let drift_threshold_km = parse_km("RESCUELINK_DRIFT_THRESHOLD_KM", "5")?;
    let max_distance_km = parse_km("RESCUELINK_MAX_DISTANCE_KM", "50")?;

    let result_limit = optional("RESCUELINK_RESULT_LIMIT")
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|e| invalid("RESCUELINK_RESULT_LIMIT", e.to_string()))
        })
        .transpose()?;
    if result_limit == Some(0) {
        return Err(invalid(
            "RESCUELINK_RESULT_LIMIT",
            "must be at least 1".to_string(),
        ));
    }

    Ok(AppConfig {
        env,
        log_level,
        catalog_path,
        openai_api_key,
        openai_base_url,
        openai_model,
        generator_timeout_secs,
        generator_max_retries,
        generator_backoff_base_ms,
        candidate_count,
        geocoder_url,
        ip_locator_url,
        device_fix,
        default_region,
        position_timeout_secs,
        position_max_age_secs,
        cache_ttl_secs,
        drift_threshold_km,
        max_distance_km,
        result_limit,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "RESCUELINK_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
