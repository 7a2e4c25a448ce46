//! [`GeoPositionProvider`]: device acquisition, manual entry, and estimates.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rescuelink_core::{
    estimate_centroid, extract_city, haversine_km, Address, CentroidEstimate, Coordinates,
    Position, PositionSource,
};
use tokio::time::Instant;

use crate::error::PositionError;
use crate::geocoder::ReverseGeocoder;
use crate::locator::DeviceLocator;

/// Label used by [`GeoPositionProvider::format_for_display`] when there is no position.
pub const NO_POSITION_LABEL: &str = "Location unavailable";

#[derive(Debug, Clone)]
pub struct GeoSettings {
    /// Upper bound on a single locator call.
    pub timeout: Duration,
    /// How long a previous device fix may be re-served as `CACHED`.
    pub max_age: Duration,
    /// Region to estimate from when nothing better is known.
    pub default_region: Option<String>,
}

impl Default for GeoSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(300),
            default_region: None,
        }
    }
}

struct LastFix {
    at: Instant,
    position: Position,
}

pub struct GeoPositionProvider {
    locator: Arc<dyn DeviceLocator>,
    geocoder: Arc<dyn ReverseGeocoder>,
    settings: GeoSettings,
    last_fix: Mutex<Option<LastFix>>,
}

impl GeoPositionProvider {
    #[must_use]
    pub fn new(
        locator: Arc<dyn DeviceLocator>,
        geocoder: Arc<dyn ReverseGeocoder>,
        settings: GeoSettings,
    ) -> Self {
        Self {
            locator,
            geocoder,
            settings,
            last_fix: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &GeoSettings {
        &self.settings
    }

    /// Acquire a fresh device position and reverse-geocode it.
    ///
    /// Geocoding failure never fails this call; the position is returned with
    /// an unlabeled address instead.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] when the locator refuses, fails, or exceeds
    /// the configured timeout.
    pub async fn acquire(&self) -> Result<Position, PositionError> {
        let position = self.locate().await?;
        Ok(self.label(position).await)
    }

    /// Like [`acquire`](Self::acquire), but re-serves the previous fix as
    /// `CACHED` when the device fails and that fix is younger than `max_age`.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error when no recent fix is available.
    pub async fn acquire_with_cache(&self) -> Result<Position, PositionError> {
        match self.acquire().await {
            Ok(position) => Ok(position),
            Err(err) => self.recent_fix(err),
        }
    }

    /// Device coordinates without an address, falling back to a recent fix.
    ///
    /// Enough to tell whether the caller moved; the geocoder is not called
    /// and the fix is not remembered. Pass the result to
    /// [`label`](Self::label) before showing it.
    ///
    /// # Errors
    ///
    /// Returns the locator error when no recent fix is available.
    pub async fn locate_with_cache(&self) -> Result<Position, PositionError> {
        match self.locate().await {
            Ok(position) => Ok(position),
            Err(err) => self.recent_fix(err),
        }
    }

    /// Reverse-geocode a device position and remember it as the last fix.
    ///
    /// Positions from any other source are returned unchanged.
    pub async fn label(&self, position: Position) -> Position {
        let (PositionSource::Gps, Some(coordinates), Some(accuracy)) = (
            position.source(),
            position.coordinates(),
            position.accuracy_meters(),
        ) else {
            return position;
        };

        let address = self.reverse_geocode(coordinates).await;
        let Ok(labeled) = Position::gps(coordinates, accuracy, address, position.acquired_at()) else {
            return position;
        };

        *self.last_fix.lock().unwrap_or_else(PoisonError::into_inner) = Some(LastFix {
            at: Instant::now(),
            position: labeled.clone(),
        });
        labeled
    }

    async fn locate(&self) -> Result<Position, PositionError> {
        let fix = tokio::time::timeout(self.settings.timeout, self.locator.locate())
            .await
            .map_err(|_| PositionError::Timeout(self.settings.timeout))??;

        tracing::debug!(
            lat = fix.coordinates.lat,
            lng = fix.coordinates.lng,
            accuracy_meters = fix.accuracy_meters,
            "acquired device position"
        );

        Position::gps(fix.coordinates, fix.accuracy_meters, Address::unlabeled(), Utc::now())
            .map_err(|e| PositionError::Unavailable(e.to_string()))
    }

    fn recent_fix(&self, err: PositionError) -> Result<Position, PositionError> {
        let cached = self
            .last_fix
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|last| last.at.elapsed() < self.settings.max_age)
            .map(|last| last.position.as_cached());

        match cached {
            Some(position) => {
                tracing::warn!(
                    kind = err.kind(),
                    error = %err,
                    "device position failed; serving recent fix"
                );
                Ok(position)
            }
            None => Err(err),
        }
    }

    /// Resolve an address for `coordinates`. Never fails.
    pub async fn reverse_geocode(&self, coordinates: Coordinates) -> Address {
        match self.geocoder.reverse(coordinates).await {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(error = %e, "reverse geocode failed; using unlabeled address");
                Address::unlabeled()
            }
        }
    }

    #[must_use]
    pub fn distance_km(&self, a: Coordinates, b: Coordinates) -> f64 {
        haversine_km(a, b)
    }

    #[must_use]
    pub fn estimate_centroid(&self, region: &str) -> CentroidEstimate {
        estimate_centroid(region)
    }

    /// A manual position from free text; the city comes from the alias table.
    #[must_use]
    pub fn manual(&self, text: &str) -> Position {
        Position::manual(text, extract_city(text).map(str::to_string), Utc::now())
    }

    /// An `ESTIMATED` position at the centroid of `region`.
    #[must_use]
    pub fn estimate(&self, region: &str) -> Position {
        let estimate = estimate_centroid(region);
        if !estimate.matched {
            tracing::debug!(region, fallback = estimate.city, "unknown region; using default centroid");
        }
        let trimmed = region.trim();
        let address = Address {
            formatted: if trimmed.is_empty() {
                estimate.city.to_string()
            } else {
                trimmed.to_string()
            },
            city: Some(estimate.city.to_string()),
            state: None,
            country: None,
        };
        Position::estimated(estimate.coordinates, address, Utc::now())
    }

    /// Estimated position for the configured default region, if any.
    #[must_use]
    pub fn default_position(&self) -> Option<Position> {
        self.settings
            .default_region
            .as_deref()
            .map(|region| self.estimate(region))
    }

    #[must_use]
    pub fn format_for_display(position: Option<&Position>) -> String {
        position.map_or_else(|| NO_POSITION_LABEL.to_string(), Position::display_label)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::GeocodeError;
    use crate::locator::{DeviceFix, StaticLocator};

    struct FixedGeocoder;

    #[async_trait]
    impl ReverseGeocoder for FixedGeocoder {
        async fn reverse(&self, _: Coordinates) -> Result<Address, GeocodeError> {
            Ok(Address {
                formatted: "Colaba".to_string(),
                city: Some("mumbai".to_string()),
                state: Some("Maharashtra".to_string()),
                country: Some("India".to_string()),
            })
        }
    }

    struct FailingGeocoder;

    #[async_trait]
    impl ReverseGeocoder for FailingGeocoder {
        async fn reverse(&self, _: Coordinates) -> Result<Address, GeocodeError> {
            Err(GeocodeError::NoLabel)
        }
    }

    /// Succeeds on the first call, then refuses.
    struct FlakyLocator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DeviceLocator for FlakyLocator {
        async fn locate(&self) -> Result<DeviceFix, PositionError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(mumbai_fix())
            } else {
                Err(PositionError::Unavailable("gps off".to_string()))
            }
        }
    }

    struct HangingLocator;

    #[async_trait]
    impl DeviceLocator for HangingLocator {
        async fn locate(&self) -> Result<DeviceFix, PositionError> {
            std::future::pending().await
        }
    }

    fn mumbai_fix() -> DeviceFix {
        DeviceFix {
            coordinates: Coordinates::new(18.9067, 72.8147),
            accuracy_meters: 15.0,
        }
    }

    fn provider(locator: Arc<dyn DeviceLocator>, geocoder: Arc<dyn ReverseGeocoder>) -> GeoPositionProvider {
        GeoPositionProvider::new(locator, geocoder, GeoSettings::default())
    }

    #[tokio::test]
    async fn acquire_returns_gps_position_with_address() {
        let geo = provider(
            Arc::new(StaticLocator::new(Some(mumbai_fix()))),
            Arc::new(FixedGeocoder),
        );
        let pos = geo.acquire().await.unwrap();
        assert_eq!(pos.source(), PositionSource::Gps);
        assert_eq!(pos.accuracy_meters(), Some(15.0));
        assert_eq!(pos.address().formatted, "Colaba");
        assert_eq!(pos.city(), Some("mumbai"));
    }

    #[tokio::test]
    async fn geocode_failure_does_not_fail_acquire() {
        let geo = provider(
            Arc::new(StaticLocator::new(Some(mumbai_fix()))),
            Arc::new(FailingGeocoder),
        );
        let pos = geo.acquire().await.unwrap();
        assert_eq!(pos.address().formatted, "Current Location");
        assert!(pos.city().is_none());
        assert!(pos.address().state.is_none());
    }

    #[tokio::test]
    async fn denied_locator_surfaces_permission_denied() {
        let geo = provider(Arc::new(StaticLocator::denied()), Arc::new(FixedGeocoder));
        assert_eq!(geo.acquire().await.unwrap_err(), PositionError::PermissionDenied);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_locator_times_out() {
        let geo = provider(Arc::new(HangingLocator), Arc::new(FixedGeocoder));
        let err = geo.acquire().await.unwrap_err();
        assert_eq!(err, PositionError::Timeout(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn recent_fix_is_served_as_cached() {
        let geo = provider(
            Arc::new(FlakyLocator {
                calls: AtomicU32::new(0),
            }),
            Arc::new(FixedGeocoder),
        );
        let first = geo.acquire_with_cache().await.unwrap();
        assert_eq!(first.source(), PositionSource::Gps);

        tokio::time::advance(Duration::from_secs(60)).await;
        let second = geo.acquire_with_cache().await.unwrap();
        assert_eq!(second.source(), PositionSource::Cached);
        assert_eq!(second.coordinates(), first.coordinates());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fix_is_not_served() {
        let geo = provider(
            Arc::new(FlakyLocator {
                calls: AtomicU32::new(0),
            }),
            Arc::new(FixedGeocoder),
        );
        geo.acquire_with_cache().await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        let err = geo.acquire_with_cache().await.unwrap_err();
        assert!(matches!(err, PositionError::Unavailable(_)));
    }

    struct CountingGeocoder {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ReverseGeocoder for CountingGeocoder {
        async fn reverse(&self, coordinates: Coordinates) -> Result<Address, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FixedGeocoder.reverse(coordinates).await
        }
    }

    #[tokio::test]
    async fn locate_skips_the_geocoder_until_labeled() {
        let geocoder = Arc::new(CountingGeocoder {
            calls: AtomicU32::new(0),
        });
        let geo = provider(
            Arc::new(StaticLocator::new(Some(mumbai_fix()))),
            geocoder.clone(),
        );

        let bare = geo.locate_with_cache().await.unwrap();
        assert_eq!(bare.source(), PositionSource::Gps);
        assert_eq!(bare.coordinates(), Some(mumbai_fix().coordinates));
        assert!(bare.city().is_none());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);

        let labeled = geo.label(bare).await;
        assert_eq!(labeled.city(), Some("mumbai"));
        assert_eq!(labeled.accuracy_meters(), Some(15.0));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn label_leaves_manual_positions_alone() {
        let geocoder = Arc::new(CountingGeocoder {
            calls: AtomicU32::new(0),
        });
        let geo = provider(Arc::new(StaticLocator::denied()), geocoder.clone());

        let manual = geo.manual("Andheri");
        assert_eq!(geo.label(manual.clone()).await, manual);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn manual_extracts_city_from_alias() {
        let geo = provider(Arc::new(StaticLocator::denied()), Arc::new(FixedGeocoder));
        let pos = geo.manual("Near Bombay Central");
        assert_eq!(pos.source(), PositionSource::Manual);
        assert_eq!(pos.city(), Some("mumbai"));
        assert!(pos.coordinates().is_none());

        let unknown = geo.manual("Panaji market");
        assert!(unknown.city().is_none());
        assert_eq!(unknown.address().formatted, "Panaji market");
    }

    #[test]
    fn estimate_uses_region_centroid() {
        let geo = provider(Arc::new(StaticLocator::denied()), Arc::new(FixedGeocoder));
        let pos = geo.estimate("Bengaluru");
        assert_eq!(pos.source(), PositionSource::Estimated);
        assert_eq!(pos.city(), Some("bangalore"));
        assert!(pos.accuracy_meters().is_none());
        assert_eq!(pos.coordinates(), Some(Coordinates::new(12.9716, 77.5946)));
    }

    #[test]
    fn default_position_requires_configured_region() {
        let geo = provider(Arc::new(StaticLocator::denied()), Arc::new(FixedGeocoder));
        assert!(geo.default_position().is_none());

        let geo = GeoPositionProvider::new(
            Arc::new(StaticLocator::denied()),
            Arc::new(FixedGeocoder),
            GeoSettings {
                default_region: Some("Chennai".to_string()),
                ..GeoSettings::default()
            },
        );
        assert_eq!(geo.default_position().unwrap().city(), Some("chennai"));
    }

    #[test]
    fn format_for_display_handles_missing_position() {
        assert_eq!(
            GeoPositionProvider::format_for_display(None),
            "Location unavailable"
        );
    }
}
