//! Great-circle distance, city centroid estimates, and free-text city extraction.
//!
//! The centroid and alias tables are data, not logic: extending coverage means
//! adding rows, never branches.

use crate::types::Coordinates;

/// Mean Earth radius used by every distance computation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// City used when a centroid is requested for an unknown name.
pub const DEFAULT_CITY: &str = "delhi";

/// Approximate city-center coordinates for covered cities.
pub const CITY_CENTROIDS: &[(&str, Coordinates)] = &[
    (
        "mumbai",
        Coordinates {
            lat: 19.076_0,
            lng: 72.877_7,
        },
    ),
    (
        "delhi",
        Coordinates {
            lat: 28.613_9,
            lng: 77.209_0,
        },
    ),
    (
        "bangalore",
        Coordinates {
            lat: 12.971_6,
            lng: 77.594_6,
        },
    ),
    (
        "chennai",
        Coordinates {
            lat: 13.082_7,
            lng: 80.270_7,
        },
    ),
    (
        "hyderabad",
        Coordinates {
            lat: 17.385_0,
            lng: 78.486_7,
        },
    ),
    (
        "pune",
        Coordinates {
            lat: 18.520_4,
            lng: 73.856_7,
        },
    ),
    (
        "kolkata",
        Coordinates {
            lat: 22.572_6,
            lng: 88.363_9,
        },
    ),
    (
        "jaipur",
        Coordinates {
            lat: 26.912_4,
            lng: 75.787_3,
        },
    ),
];

/// Alternate names and satellite towns, mapped to the covered city they resolve to.
pub const CITY_ALIASES: &[(&str, &str)] = &[
    ("bombay", "mumbai"),
    ("new delhi", "delhi"),
    ("ncr", "delhi"),
    ("gurgaon", "delhi"),
    ("gurugram", "delhi"),
    ("noida", "delhi"),
    ("bengaluru", "bangalore"),
    ("mysore", "bangalore"),
    ("madras", "chennai"),
    ("secunderabad", "hyderabad"),
    ("calcutta", "kolkata"),
];

/// Result of [`estimate_centroid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentroidEstimate {
    /// Canonical name of the city whose centroid was used.
    pub city: &'static str,
    pub coordinates: Coordinates,
    /// `false` when the name was unknown and [`DEFAULT_CITY`] was substituted.
    pub matched: bool,
}

/// Haversine great-circle distance in kilometers.
///
/// Symmetric and zero for identical points. Not intended for near-antipodal
/// pairs.
#[must_use]
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    (EARTH_RADIUS_KM * c).max(0.0)
}

/// Approximate centroid for a city or region name.
///
/// Accepts canonical names and aliases ("Bombay", "Bengaluru"). Unknown names
/// resolve to [`DEFAULT_CITY`] with `matched = false` so callers can flag the
/// resulting distance as low precision.
#[must_use]
pub fn estimate_centroid(name: &str) -> CentroidEstimate {
    let resolved = extract_city(name);
    let city = resolved.unwrap_or(DEFAULT_CITY);
    let coordinates = centroid_of(city).unwrap_or(Coordinates {
        lat: 28.613_9,
        lng: 77.209_0,
    });
    CentroidEstimate {
        city,
        coordinates,
        matched: resolved.is_some(),
    }
}

fn centroid_of(city: &str) -> Option<Coordinates> {
    CITY_CENTROIDS
        .iter()
        .find(|(name, _)| *name == city)
        .map(|(_, coords)| *coords)
}

/// Find a covered city mentioned in free text.
///
/// Matching is whole-word and case-insensitive: canonical names are tried
/// first, then aliases. Returns `None` when nothing fires; there is no
/// default guess.
#[must_use]
pub fn extract_city(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }

    let mentions = |phrase: &str| {
        let needle: Vec<&str> = phrase.split_whitespace().collect();
        words.windows(needle.len()).any(|w| w == needle.as_slice())
    };

    CITY_CENTROIDS
        .iter()
        .map(|(name, _)| *name)
        .find(|name| mentions(name))
        .or_else(|| {
            CITY_ALIASES
                .iter()
                .find(|(alias, _)| mentions(alias))
                .map(|(_, city)| *city)
        })
}

/// Canonical comparison key for a city name.
///
/// Known cities and aliases resolve to their canonical name; anything else is
/// trimmed and lower-cased.
#[must_use]
pub fn normalize_city(name: &str) -> String {
    extract_city(name).map_or_else(|| name.trim().to_lowercase(), str::to_string)
}

/// Human label for a distance: meters below 1 km, one decimal above.
#[must_use]
pub fn distance_label(distance_km: f64) -> String {
    if distance_km < 1.0 {
        format!("{:.0}m away", (distance_km * 1000.0).round())
    } else {
        format!("{distance_km:.1}km away")
    }
}
