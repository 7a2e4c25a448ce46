//! Position, criteria, and recommendation-set types shared by every crate.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::RankedProvider;
use crate::CoreError;

/// Label used when a GPS fix exists but no address could be resolved.
pub const UNLABELED_LOCATION: &str = "Current Location";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `true` when both components are finite and inside WGS-84 bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub formatted: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Address attached to a fix whose reverse geocode failed.
    #[must_use]
    pub fn unlabeled() -> Self {
        Self {
            formatted: UNLABELED_LOCATION.to_string(),
            city: None,
            state: None,
            country: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSource {
    Gps,
    Cached,
    Manual,
    Estimated,
}

impl std::fmt::Display for PositionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSource::Gps => write!(f, "gps"),
            PositionSource::Cached => write!(f, "cached"),
            PositionSource::Manual => write!(f, "manual"),
            PositionSource::Estimated => write!(f, "estimated"),
        }
    }
}

/// Where the caller is, and how we know.
///
/// Fields are private so the GPS invariant (coordinates present, accuracy
/// non-negative) holds for every value in circulation. A later acquisition
/// produces a new `Position`; existing ones are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    coordinates: Option<Coordinates>,
    address: Address,
    accuracy_meters: Option<f64>,
    source: PositionSource,
    acquired_at: DateTime<Utc>,
}

impl Position {
    /// Build a device-sourced position.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFix`] when the coordinates are out of range
    /// or the accuracy is negative or non-finite.
    pub fn gps(
        coordinates: Coordinates,
        accuracy_meters: f64,
        address: Address,
        acquired_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if !coordinates.is_valid() {
            return Err(CoreError::InvalidFix(format!(
                "coordinates out of range: {}, {}",
                coordinates.lat, coordinates.lng
            )));
        }
        if !accuracy_meters.is_finite() || accuracy_meters < 0.0 {
            return Err(CoreError::InvalidFix(format!(
                "accuracy must be a non-negative number of meters, got {accuracy_meters}"
            )));
        }
        Ok(Self {
            coordinates: Some(coordinates),
            address,
            accuracy_meters: Some(accuracy_meters),
            source: PositionSource::Gps,
            acquired_at,
        })
    }

    /// A free-text location typed by the caller. Never carries coordinates.
    #[must_use]
    pub fn manual(text: &str, city: Option<String>, acquired_at: DateTime<Utc>) -> Self {
        Self {
            coordinates: None,
            address: Address {
                formatted: text.trim().to_string(),
                city,
                state: None,
                country: None,
            },
            accuracy_meters: None,
            source: PositionSource::Manual,
            acquired_at,
        }
    }

    /// A low-precision position derived from a region centroid.
    #[must_use]
    pub fn estimated(
        coordinates: Coordinates,
        address: Address,
        acquired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            coordinates: Some(coordinates),
            address,
            accuracy_meters: None,
            source: PositionSource::Estimated,
            acquired_at,
        }
    }

    /// Re-issue a previous fix as a cached one. Everything but the source is kept.
    #[must_use]
    pub fn as_cached(&self) -> Self {
        Self {
            source: PositionSource::Cached,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    #[must_use]
    pub fn city(&self) -> Option<&str> {
        self.address.city.as_deref()
    }

    #[must_use]
    pub fn accuracy_meters(&self) -> Option<f64> {
        self.accuracy_meters
    }

    #[must_use]
    pub fn source(&self) -> PositionSource {
        self.source
    }

    #[must_use]
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// One-line label for terminal output.
    #[must_use]
    pub fn display_label(&self) -> String {
        match (self.source, self.accuracy_meters) {
            (PositionSource::Gps, Some(accuracy)) => {
                format!("{} (GPS: {accuracy:.0}m accuracy)", self.address.formatted)
            }
            _ => self.address.formatted.clone(),
        }
    }
}

/// Caller-supplied urgency classification. Computed upstream; opaque here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyTier {
    Standard,
    High,
    Critical,
}

impl UrgencyTier {
    /// High and critical requests get 24×7 and emergency providers first.
    #[must_use]
    pub fn is_elevated(self) -> bool {
        matches!(self, UrgencyTier::High | UrgencyTier::Critical)
    }
}

impl std::fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrgencyTier::Standard => write!(f, "standard"),
            UrgencyTier::High => write!(f, "high"),
            UrgencyTier::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for UrgencyTier {
    type Err = CoreError;

    /// `low` and `medium` collapse into `standard`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "medium" | "low" => Ok(UrgencyTier::Standard),
            "high" => Ok(UrgencyTier::High),
            "critical" => Ok(UrgencyTier::Critical),
            other => Err(CoreError::UnknownUrgency(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    pub specialization: String,
    pub urgency_tier: UrgencyTier,
}

impl MatchCriteria {
    #[must_use]
    pub fn new(specialization: &str, urgency_tier: UrgencyTier) -> Self {
        Self {
            specialization: specialization.trim().to_lowercase(),
            urgency_tier,
        }
    }
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self::new("all", UrgencyTier::High)
    }
}

/// Narrative advice returned alongside generated candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Guidance {
    pub immediate_steps: Vec<String>,
    pub safety_tips: Vec<String>,
    pub when_to_call: Option<String>,
}

impl Guidance {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.immediate_steps.is_empty() && self.safety_tips.is_empty() && self.when_to_call.is_none()
    }
}

/// The cached unit: ranked providers for one position and one set of criteria.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSet {
    pub position: Option<Position>,
    pub providers: Vec<RankedProvider>,
    pub generated_at: DateTime<Utc>,
    pub fallback_used: bool,
    pub criteria: MatchCriteria,
    pub guidance: Option<Guidance>,
}
