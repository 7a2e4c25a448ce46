//! Provider records and their normalization.
//!
//! Catalog YAML and generator JSON both deserialize into [`RawProvider`]; the
//! rest of the engine only ever sees the normalized [`Provider`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Coordinates, UrgencyTier};

/// Where a provider record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderOrigin {
    Catalog,
    Generated,
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub specializations: BTreeSet<String>,
    pub availability_window: String,
    #[serde(rename = "is24x7")]
    pub is_24x7: bool,
    pub urgency_tier: UrgencyTier,
    pub rating: f64,
    pub description: Option<String>,
    pub services: Vec<String>,
    pub origin: ProviderOrigin,
}

impl Provider {
    /// `true` when the provider lists `specialization` (already lower-cased).
    #[must_use]
    pub fn declares(&self, specialization: &str) -> bool {
        self.specializations.contains(specialization)
    }

    /// `true` for "all" / "all animals" style catch-all entries.
    #[must_use]
    pub fn declares_all(&self) -> bool {
        self.specializations
            .iter()
            .any(|s| s == "all" || s.starts_with("all "))
    }

    /// `true` when any specialization mentions emergency work.
    #[must_use]
    pub fn is_emergency(&self) -> bool {
        self.specializations.iter().any(|s| s.contains("emergency"))
    }
}

/// A provider after ranking, annotated with its distance from the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProvider {
    #[serde(flatten)]
    pub provider: Provider,
    pub distance_km: Option<f64>,
    pub distance_label: Option<String>,
    /// Distance came from a city centroid rather than provider coordinates.
    pub distance_estimated: bool,
}

impl RankedProvider {
    /// Wrap a provider with no distance information.
    #[must_use]
    pub fn unranked(provider: Provider) -> Self {
        Self {
            provider,
            distance_km: None,
            distance_label: None,
            distance_estimated: false,
        }
    }
}

/// Coordinates as they appear in the wild: `[lat, lng]` or an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCoordinates {
    Pair([f64; 2]),
    Object {
        #[serde(alias = "latitude")]
        lat: f64,
        #[serde(alias = "lon", alias = "longitude")]
        lng: f64,
    },
}

impl RawCoordinates {
    fn into_coordinates(self) -> Option<Coordinates> {
        let coords = match self {
            RawCoordinates::Pair([lat, lng]) | RawCoordinates::Object { lat, lng } => {
                Coordinates { lat, lng }
            }
        };
        coords.is_valid().then_some(coords)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s.split(',').map(str::to_string).collect(),
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Un-normalized provider record, accepting both catalog and generator spellings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProvider {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
    #[serde(default, alias = "specialization", deserialize_with = "one_or_many")]
    pub specializations: Vec<String>,
    #[serde(
        default,
        alias = "availabilityWindow",
        alias = "availability_window"
    )]
    pub availability: Option<String>,
    #[serde(default, rename = "is24x7", alias = "is_24x7")]
    pub is_24x7: Option<bool>,
    #[serde(
        default,
        rename = "urgencyLevel",
        alias = "urgency_tier",
        alias = "urgencyTier",
        alias = "urgency"
    )]
    pub urgency: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub services: Vec<String>,
}

impl RawProvider {
    /// Normalize into a [`Provider`].
    ///
    /// Returns `None` when the record has no usable name or phone; such a
    /// contact cannot be acted on.
    #[must_use]
    pub fn normalize(self, origin: ProviderOrigin) -> Option<Provider> {
        let name = non_empty(self.name)?;
        let phone = non_empty(self.phone)?;

        let specializations: BTreeSet<String> = self
            .specializations
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let availability = non_empty(self.availability);
        let is_24x7 = self.is_24x7.unwrap_or_else(|| {
            availability
                .as_deref()
                .is_some_and(|a| a.contains("24/7") || a.to_lowercase().contains("24x7"))
        });
        let availability_window = availability.unwrap_or_else(|| {
            if is_24x7 {
                "24/7".to_string()
            } else {
                "Not specified".to_string()
            }
        });

        let urgency_tier = self
            .urgency
            .as_deref()
            .and_then(|u| u.parse().ok())
            .unwrap_or(UrgencyTier::Standard);

        let rating = self
            .rating
            .filter(|r| r.is_finite())
            .map_or(0.0, |r| r.clamp(0.0, 5.0));

        let id = non_empty(self.id).unwrap_or_else(|| stable_provider_id(&name, &phone));

        Some(Provider {
            id,
            name,
            phone,
            email: non_empty(self.email),
            address: non_empty(self.address),
            city: non_empty(self.city).map(|c| c.to_lowercase()),
            coordinates: self.coordinates.and_then(RawCoordinates::into_coordinates),
            specializations,
            availability_window,
            is_24x7,
            urgency_tier,
            rating,
            description: non_empty(self.description),
            services: self
                .services
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            origin,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Stable id for records that arrive without one.
///
/// SHA-256 over the lower-cased name and the digits of the phone number,
/// hex-encoded and truncated to 16 characters.
#[must_use]
pub fn stable_provider_id(name: &str, phone: &str) -> String {
    use sha2::{Digest, Sha256};
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let input = format!("{}\x00{}", name.trim().to_lowercase(), digits);
    let mut hex = format!("{:x}", Sha256::digest(input.as_bytes()));
    hex.truncate(16);
    hex
}

/// The nationwide helpline returned whenever nothing else matches.
#[must_use]
pub fn fallback_provider() -> Provider {
    Provider {
        id: "national-animal-welfare-helpline".to_string(),
        name: "National Animal Welfare Helpline".to_string(),
        phone: "1962".to_string(),
        email: Some("help@animalwelfare.gov.in".to_string()),
        address: Some("India".to_string()),
        city: None,
        coordinates: None,
        specializations: ["all animals", "emergency"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        availability_window: "24/7".to_string(),
        is_24x7: true,
        urgency_tier: UrgencyTier::Critical,
        rating: 5.0,
        description: Some("Government emergency helpline for all animal emergencies".to_string()),
        services: vec!["emergency rescue".to_string(), "coordination".to_string()],
        origin: ProviderOrigin::Builtin,
    }
}

/// Secondary built-in contact for the municipal animal control office.
#[must_use]
pub fn local_animal_control(city: Option<&str>) -> Provider {
    let place = city.unwrap_or("Municipal Office");
    Provider {
        id: "local-animal-control".to_string(),
        name: "Local Animal Control".to_string(),
        phone: "+91-11-2345-6789".to_string(),
        email: None,
        address: Some(place.to_string()),
        city: city.map(str::to_lowercase),
        coordinates: None,
        specializations: ["stray animals", "public safety"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        availability_window: "9 AM - 6 PM".to_string(),
        is_24x7: false,
        urgency_tier: UrgencyTier::High,
        rating: 3.0,
        description: Some("Local municipal animal control services".to_string()),
        services: vec!["stray animal rescue".to_string(), "public safety".to_string()],
        origin: ProviderOrigin::Builtin,
    }
}
