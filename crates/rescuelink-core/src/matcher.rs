//! Provider filtering, distance annotation, and priority ordering.

use std::cmp::Ordering;

use crate::geo::{distance_label, estimate_centroid, haversine_km};
use crate::provider::{fallback_provider, Provider, RankedProvider};
use crate::types::{MatchCriteria, Position, UrgencyTier};

/// Providers farther than this are dropped unless the caller overrides it.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    /// Providers with a known distance beyond this radius are excluded.
    pub max_distance_km: f64,
    /// Optional cap on the number of ranked providers returned.
    pub limit: Option<usize>,
    /// Served alone when nothing survives filtering.
    pub fallback: Provider,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            limit: None,
            fallback: fallback_provider(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub providers: Vec<RankedProvider>,
    /// `true` when nothing matched and the nationwide helpline was substituted.
    pub fallback_used: bool,
}

/// Filter, annotate, and order `providers` for `criteria`.
///
/// Never returns an empty list: when filtering or the distance bound removes
/// everything, the result is the single fallback provider with
/// `fallback_used = true`.
#[must_use]
pub fn rank_providers(
    providers: &[Provider],
    criteria: &MatchCriteria,
    position: Option<&Position>,
    options: &MatchOptions,
) -> MatchOutcome {
    let origin = position.and_then(Position::coordinates);

    let mut ranked: Vec<RankedProvider> = providers
        .iter()
        .filter(|p| passes_filter(p, criteria))
        .map(|p| annotate(p.clone(), origin))
        .filter(|r| {
            r.distance_km
                .is_none_or(|d| d <= options.max_distance_km)
        })
        .collect();

    if ranked.is_empty() {
        tracing::debug!(
            specialization = %criteria.specialization,
            urgency = %criteria.urgency_tier,
            candidates = providers.len(),
            fallback = %options.fallback.name,
            "no provider matched; substituting fallback helpline"
        );
        return MatchOutcome {
            providers: vec![RankedProvider::unranked(options.fallback.clone())],
            fallback_used: true,
        };
    }

    // `sort_by` is stable, so ties keep catalog order.
    ranked.sort_by(|a, b| compare(a, b, criteria.urgency_tier));

    if let Some(limit) = options.limit {
        ranked.truncate(limit.max(1));
    }

    MatchOutcome {
        providers: ranked,
        fallback_used: false,
    }
}

fn passes_filter(provider: &Provider, criteria: &MatchCriteria) -> bool {
    let target = criteria.specialization.as_str();
    if target.is_empty() || target == "all" || target == "unknown" {
        return true;
    }
    provider.declares(target)
        || provider.declares_all()
        || (criteria.urgency_tier == UrgencyTier::Critical && provider.is_emergency())
}

fn annotate(provider: Provider, origin: Option<crate::types::Coordinates>) -> RankedProvider {
    let Some(origin) = origin else {
        return RankedProvider::unranked(provider);
    };

    let target = match (provider.coordinates, provider.city.as_deref()) {
        (Some(coords), _) => Some((coords, false)),
        (None, Some(city)) => Some((estimate_centroid(city).coordinates, true)),
        (None, None) => None,
    };

    match target {
        Some((coords, estimated)) => {
            let distance = haversine_km(origin, coords);
            RankedProvider {
                provider,
                distance_km: Some(distance),
                distance_label: Some(distance_label(distance)),
                distance_estimated: estimated,
            }
        }
        None => RankedProvider::unranked(provider),
    }
}

fn compare(a: &RankedProvider, b: &RankedProvider, urgency: UrgencyTier) -> Ordering {
    let elevated = if urgency.is_elevated() {
        b.provider
            .is_24x7
            .cmp(&a.provider.is_24x7)
            .then_with(|| b.provider.is_emergency().cmp(&a.provider.is_emergency()))
    } else {
        Ordering::Equal
    };

    elevated
        .then_with(|| match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.provider.rating.total_cmp(&a.provider.rating))
}
