//! Has the caller moved far enough to make a cached set stale?

use rescuelink_core::{haversine_km, normalize_city, Position, PositionSource};

/// Compare the position a set was built for with the current one.
///
/// - both with coordinates: drift when the distance exceeds `threshold_km`
///   (a distance exactly at the threshold is not drift)
/// - otherwise both with a city: drift when the normalized cities differ
/// - otherwise both manual: drift when the normalized text differs
/// - anything else, including a missing position on either side, cannot be
///   compared and counts as drift
#[must_use]
pub fn has_drifted(cached: Option<&Position>, current: Option<&Position>, threshold_km: f64) -> bool {
    let (Some(cached), Some(current)) = (cached, current) else {
        return true;
    };

    if let (Some(a), Some(b)) = (cached.coordinates(), current.coordinates()) {
        return haversine_km(a, b) > threshold_km;
    }

    if let (Some(a), Some(b)) = (cached.city(), current.city()) {
        return normalize_city(a) != normalize_city(b);
    }

    if cached.source() == PositionSource::Manual && current.source() == PositionSource::Manual {
        return normalize_text(&cached.address().formatted) != normalize_text(&current.address().formatted);
    }

    true
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
