//! Device position sources.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rescuelink_core::{Coordinates, DeviceFixConfig};
use serde::Deserialize;

use crate::error::PositionError;

/// Accuracy reported for IP-based fixes; they resolve to roughly a city.
pub const IP_FIX_ACCURACY_METERS: f64 = 5_000.0;

/// A raw fix from a device, before reverse geocoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceFix {
    pub coordinates: Coordinates,
    pub accuracy_meters: f64,
}

impl From<DeviceFixConfig> for DeviceFix {
    fn from(config: DeviceFixConfig) -> Self {
        Self {
            coordinates: config.coordinates,
            accuracy_meters: config.accuracy_meters,
        }
    }
}

#[async_trait]
pub trait DeviceLocator: Send + Sync {
    async fn locate(&self) -> Result<DeviceFix, PositionError>;
}

/// Locator with a fixed answer.
///
/// Without a configured fix it behaves like a device whose user declined
/// location access.
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    fix: Option<DeviceFix>,
}

impl StaticLocator {
    #[must_use]
    pub fn new(fix: Option<DeviceFix>) -> Self {
        Self { fix }
    }

    #[must_use]
    pub fn denied() -> Self {
        Self { fix: None }
    }
}

#[async_trait]
impl DeviceLocator for StaticLocator {
    async fn locate(&self) -> Result<DeviceFix, PositionError> {
        self.fix.ok_or(PositionError::PermissionDenied)
    }
}

#[derive(Debug, Deserialize)]
struct IpLocationResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// IP-geolocation locator for endpoints answering `{status, lat, lon}`.
pub struct HttpLocator {
    client: Client,
    url: String,
}

impl HttpLocator {
    /// # Errors
    ///
    /// Returns [`PositionError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PositionError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent("rescuelink/0.1 (position)")
            .build()
            .map_err(|e| PositionError::Unavailable(format!("client construction failed: {e}")))?;

        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }
}

#[async_trait]
impl DeviceLocator for HttpLocator {
    async fn locate(&self) -> Result<DeviceFix, PositionError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PositionError::Unavailable(e.to_string()))?;

        let body: IpLocationResponse = response
            .json()
            .await
            .map_err(|e| PositionError::Unavailable(format!("malformed locator response: {e}")))?;

        if body.status != "success" {
            return Err(PositionError::Unavailable(
                body.message.unwrap_or_else(|| body.status.clone()),
            ));
        }

        let (Some(lat), Some(lon)) = (body.lat, body.lon) else {
            return Err(PositionError::Unavailable(
                "locator response has no coordinates".to_string(),
            ));
        };

        let coordinates = Coordinates::new(lat, lon);
        if !coordinates.is_valid() {
            return Err(PositionError::Unavailable(format!(
                "locator returned out-of-range coordinates: {lat}, {lon}"
            )));
        }

        Ok(DeviceFix {
            coordinates,
            accuracy_meters: IP_FIX_ACCURACY_METERS,
        })
    }
}
