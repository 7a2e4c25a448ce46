//! Reverse geocoding: coordinates to a human-readable address.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use rescuelink_core::{Address, Coordinates};
use serde::Deserialize;

use crate::error::GeocodeError;

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coordinates: Coordinates) -> Result<Address, GeocodeError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BigDataCloudResponse {
    #[serde(default)]
    locality: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    principal_subdivision: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
}

impl BigDataCloudResponse {
    fn into_address(self) -> Result<Address, GeocodeError> {
        let locality = present(self.locality);
        let city = present(self.city);
        let state = present(self.principal_subdivision);

        let formatted = locality
            .clone()
            .or_else(|| city.clone())
            .or_else(|| state.clone())
            .ok_or(GeocodeError::NoLabel)?;

        Ok(Address {
            formatted,
            city: city.or(locality).map(|c| c.to_lowercase()),
            state,
            country: present(self.country_name),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Client for the BigDataCloud client-side reverse-geocode endpoint.
pub struct BigDataCloudGeocoder {
    client: Client,
    endpoint: Url,
}

impl BigDataCloudGeocoder {
    /// Build a geocoder against `endpoint` (the full `reverse-geocode-client` URL).
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built and
    /// [`GeocodeError::InvalidUrl`] if `endpoint` does not parse.
    pub fn with_base_url(endpoint: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent("rescuelink/0.1 (geocoder)")
            .build()?;

        let endpoint = Url::parse(endpoint).map_err(|e| GeocodeError::InvalidUrl {
            url: endpoint.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self { client, endpoint })
    }

    fn request_url(&self, coordinates: Coordinates) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &coordinates.lat.to_string())
            .append_pair("longitude", &coordinates.lng.to_string())
            .append_pair("localityLanguage", "en");
        url
    }
}

#[async_trait]
impl ReverseGeocoder for BigDataCloudGeocoder {
    async fn reverse(&self, coordinates: Coordinates) -> Result<Address, GeocodeError> {
        let url = self.request_url(coordinates);
        let body: serde_json::Value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let parsed: BigDataCloudResponse =
            serde_json::from_value(body).map_err(|e| GeocodeError::Deserialize {
                context: format!("reverse-geocode({}, {})", coordinates.lat, coordinates.lng),
                source: e,
            })?;

        parsed.into_address()
    }
}
