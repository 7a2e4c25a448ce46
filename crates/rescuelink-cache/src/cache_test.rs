use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rescuelink_core::{
    Address, Coordinates, PositionSource, Provider, ProviderOrigin, RawCoordinates, RawProvider,
    UrgencyTier, EARTH_RADIUS_KM,
};
use rescuelink_generator::{CandidateBatch, GeneratorError};
use rescuelink_geo::{
    DeviceFix, DeviceLocator, GeoSettings, GeocodeError, PositionError, ReverseGeocoder,
};

use super::*;

const DELHI: Coordinates = Coordinates {
    lat: 28.6139,
    lng: 77.2090,
};

struct MovableLocator {
    at: Mutex<Option<Coordinates>>,
}

impl MovableLocator {
    fn at(coords: Option<Coordinates>) -> Arc<Self> {
        Arc::new(Self {
            at: Mutex::new(coords),
        })
    }

    fn move_to(&self, coords: Coordinates) {
        *self.at.lock().unwrap() = Some(coords);
    }
}

#[async_trait]
impl DeviceLocator for MovableLocator {
    async fn locate(&self) -> Result<DeviceFix, PositionError> {
        let coords = (*self.at.lock().unwrap()).ok_or(PositionError::PermissionDenied)?;
        Ok(DeviceFix {
            coordinates: coords,
            accuracy_meters: 10.0,
        })
    }
}

struct NoGeocoder;

#[async_trait]
impl ReverseGeocoder for NoGeocoder {
    async fn reverse(&self, _: Coordinates) -> Result<Address, GeocodeError> {
        Err(GeocodeError::NoLabel)
    }
}

enum Behaviour {
    Providers(Vec<Provider>),
    Fail,
    Panic,
}

struct FakeGenerator {
    calls: AtomicU32,
    delay: Duration,
    behaviour: Behaviour,
}

impl FakeGenerator {
    fn new(behaviour: Behaviour, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay,
            behaviour,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateGenerator for FakeGenerator {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn generate(
        &self,
        _: Option<&Position>,
        _: &MatchCriteria,
    ) -> Result<CandidateBatch, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behaviour {
            Behaviour::Providers(providers) => Ok(CandidateBatch {
                providers: providers.clone(),
                guidance: None,
            }),
            Behaviour::Fail => Err(GeneratorError::EmptyCompletion),
            Behaviour::Panic => panic!("generator exploded"),
        }
    }
}

fn provider(name: &str, specialization: &str, coords: Coordinates) -> Provider {
    RawProvider {
        name: Some(name.to_string()),
        phone: Some("+91-11-0000-0000".to_string()),
        specializations: vec![specialization.to_string()],
        coordinates: Some(RawCoordinates::Pair([coords.lat, coords.lng])),
        ..RawProvider::default()
    }
    .normalize(ProviderOrigin::Generated)
    .unwrap()
}

fn delhi_providers() -> Behaviour {
    Behaviour::Providers(vec![
        provider("Connaught Vet", "dog", Coordinates::new(28.63, 77.22)),
        provider("Karol Bagh Shelter", "all animals", Coordinates::new(28.65, 77.19)),
    ])
}

fn north_of(origin: Coordinates, km: f64) -> Coordinates {
    Coordinates::new(origin.lat + (km / EARTH_RADIUS_KM).to_degrees(), origin.lng)
}

struct CountingGeocoder {
    calls: AtomicU32,
}

#[async_trait]
impl ReverseGeocoder for CountingGeocoder {
    async fn reverse(&self, _: Coordinates) -> Result<Address, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Address {
            formatted: "Connaught Place".to_string(),
            city: Some("delhi".to_string()),
            state: None,
            country: None,
        })
    }
}

fn cache_with(
    locator: Arc<dyn DeviceLocator>,
    generator: Arc<dyn CandidateGenerator>,
    default_region: Option<&str>,
) -> RecommendationCache {
    let geo = GeoPositionProvider::new(
        locator,
        Arc::new(NoGeocoder),
        GeoSettings {
            default_region: default_region.map(str::to_string),
            ..GeoSettings::default()
        },
    );
    RecommendationCache::new(Arc::new(geo), generator, CacheSettings::default())
}

fn cache_with_settings(
    locator: Arc<dyn DeviceLocator>,
    geocoder: Arc<dyn ReverseGeocoder>,
    generator: Arc<dyn CandidateGenerator>,
    settings: CacheSettings,
) -> RecommendationCache {
    let geo = GeoPositionProvider::new(locator, geocoder, GeoSettings::default());
    RecommendationCache::new(Arc::new(geo), generator, settings)
}

fn city_helpline() -> Provider {
    RawProvider {
        id: Some("delhi-helpline".to_string()),
        name: Some("Delhi Animal Helpline".to_string()),
        phone: Some("155".to_string()),
        specializations: vec!["all animals".to_string()],
        ..RawProvider::default()
    }
    .normalize(ProviderOrigin::Catalog)
    .unwrap()
}

fn dog_high() -> MatchCriteria {
    MatchCriteria::new("dog", UrgencyTier::High)
}

#[tokio::test(start_paused = true)]
async fn concurrent_gets_share_a_single_refresh() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::from_millis(200));
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);
    let criteria = dog_high();

    let results = futures::future::join_all((0..10).map(|_| cache.get(&criteria, false))).await;

    assert_eq!(generator.calls(), 1);
    assert!(results.iter().all(|set| Arc::ptr_eq(set, &results[0])));
    assert!(!results[0].fallback_used);
}

#[tokio::test]
async fn repeated_get_within_ttl_returns_the_same_set() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let first = cache.get(&dog_high(), false).await;
    let second = cache.get(&dog_high(), false).await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(generator.calls(), 1);
    assert!(cache.cached().is_some_and(|c| Arc::ptr_eq(&c, &first)));
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_refreshed() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let first = cache.get(&dog_high(), false).await;
    tokio::time::advance(Duration::from_secs(29 * 60)).await;
    let still_fresh = cache.get(&dog_high(), false).await;
    assert!(Arc::ptr_eq(&first, &still_fresh));

    tokio::time::advance(Duration::from_secs(61)).await;
    let refreshed = cache.get(&dog_high(), false).await;
    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn drift_beyond_threshold_triggers_refresh() {
    let locator = MovableLocator::at(Some(DELHI));
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let cache = cache_with(locator.clone(), generator.clone(), None);

    let first = cache.get(&dog_high(), false).await;

    locator.move_to(north_of(DELHI, 4.9));
    let nearby = cache.get(&dog_high(), false).await;
    assert!(Arc::ptr_eq(&first, &nearby), "4.9 km is within the drift threshold");

    locator.move_to(north_of(DELHI, 5.1));
    let moved = cache.get(&dog_high(), false).await;
    assert!(!Arc::ptr_eq(&first, &moved));
    assert_eq!(generator.calls(), 2);
    assert_eq!(
        moved.position.as_ref().and_then(Position::coordinates),
        Some(north_of(DELHI, 5.1))
    );
}

#[tokio::test]
async fn different_criteria_is_a_miss() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let dogs = cache.get(&dog_high(), false).await;
    let cats = cache
        .get(&MatchCriteria::new("cat", UrgencyTier::Standard), false)
        .await;

    assert!(!Arc::ptr_eq(&dogs, &cats));
    assert_eq!(cats.criteria.specialization, "cat");
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn force_refresh_bypasses_a_valid_entry() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let first = cache.get(&dog_high(), false).await;
    let forced = cache.get(&dog_high(), true).await;

    assert!(!Arc::ptr_eq(&first, &forced));
    assert_eq!(generator.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidate_during_refresh_discards_its_result() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::from_millis(100));
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let early = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get(&dog_high(), false).await }
    });
    while generator.calls() == 0 {
        tokio::task::yield_now().await;
    }

    cache.invalidate();
    let late = cache.get(&dog_high(), false).await;
    let early = early.await.unwrap();

    assert_eq!(generator.calls(), 2, "superseded refresh must not be reused");
    assert!(!Arc::ptr_eq(&early, &late));
    assert!(cache.cached().is_some_and(|c| Arc::ptr_eq(&c, &late)));
}

#[tokio::test(start_paused = true)]
async fn refresh_completes_when_every_caller_is_gone() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::from_millis(100));
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let caller = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get(&dog_high(), false).await }
    });
    while generator.calls() == 0 {
        tokio::task::yield_now().await;
    }
    caller.abort();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(cache.cached().is_some());
    cache.get(&dog_high(), false).await;
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn generator_failure_serves_fallback_with_position() {
    let generator = FakeGenerator::new(Behaviour::Fail, Duration::ZERO);
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let set = cache.get(&dog_high(), false).await;

    assert!(set.fallback_used);
    assert_eq!(set.providers[0].provider.phone, "1962");
    assert_eq!(
        set.position.as_ref().map(Position::source),
        Some(PositionSource::Gps)
    );
    assert!(set.guidance.is_some());
}

#[tokio::test]
async fn total_failure_serves_fallback_without_position() {
    let generator = FakeGenerator::new(Behaviour::Fail, Duration::ZERO);
    let cache = cache_with(MovableLocator::at(None), generator.clone(), None);

    let set = cache.get(&dog_high(), false).await;

    assert!(set.fallback_used);
    assert!(set.position.is_none());
    assert_eq!(set.providers.len(), 2);
    assert!(cache.cached().is_some(), "the fallback set is cached too");
}

#[tokio::test]
async fn panicking_generator_degrades_to_fallback_and_retries_later() {
    let generator = FakeGenerator::new(Behaviour::Panic, Duration::ZERO);
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let set = cache.get(&dog_high(), false).await;
    assert!(set.fallback_used);
    assert!(cache.cached().is_none());

    cache.get(&dog_high(), false).await;
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn denied_locator_uses_default_region_estimate() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let cache = cache_with(MovableLocator::at(None), generator.clone(), Some("New Delhi"));

    let set = cache.get(&dog_high(), false).await;

    let position = set.position.as_ref().unwrap();
    assert_eq!(position.source(), PositionSource::Estimated);
    assert_eq!(position.city(), Some("delhi"));
    assert!(set.providers.iter().all(|p| p.distance_km.is_some()));

    let again = cache.get(&dog_high(), false).await;
    assert!(Arc::ptr_eq(&set, &again), "estimated positions do not drift");
}

#[tokio::test]
async fn unmatched_candidates_fall_back_to_helpline() {
    let generator = FakeGenerator::new(
        Behaviour::Providers(vec![provider("Bird Aid", "birds", DELHI)]),
        Duration::ZERO,
    );
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    let set = cache.get(&dog_high(), false).await;

    assert!(set.fallback_used);
    assert_eq!(set.providers.len(), 1);
    assert_eq!(set.providers[0].provider.phone, "1962");
    assert!(set.guidance.is_some());
}

#[tokio::test]
async fn manual_override_replaces_device_until_cleared() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let cache = cache_with(MovableLocator::at(Some(DELHI)), generator.clone(), None);

    cache.set_manual_override(Position::manual(
        "Bandra, Mumbai",
        Some("mumbai".into()),
        Utc::now(),
    ));
    let manual = cache.get(&dog_high(), false).await;
    assert_eq!(
        manual.position.as_ref().map(Position::source),
        Some(PositionSource::Manual)
    );

    cache.clear();
    assert!(cache.manual_override().is_none());
    let device = cache.get(&dog_high(), false).await;
    assert_eq!(
        device.position.as_ref().map(Position::source),
        Some(PositionSource::Gps)
    );
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn unknown_position_is_retried_on_every_get() {
    let generator = FakeGenerator::new(Behaviour::Fail, Duration::ZERO);
    let cache = cache_with(MovableLocator::at(None), generator.clone(), None);

    let first = cache.get(&dog_high(), false).await;
    let second = cache.get(&dog_high(), false).await;

    assert!(first.fallback_used && second.fallback_used);
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn cache_hits_do_not_reverse_geocode() {
    let locator = MovableLocator::at(Some(DELHI));
    let geocoder = Arc::new(CountingGeocoder {
        calls: AtomicU32::new(0),
    });
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let cache = cache_with_settings(
        locator.clone(),
        geocoder.clone(),
        generator.clone(),
        CacheSettings::default(),
    );

    let first = cache.get(&dog_high(), false).await;
    assert_eq!(first.position.as_ref().and_then(Position::city), Some("delhi"));
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

    for _ in 0..3 {
        let hit = cache.get(&dog_high(), false).await;
        assert!(Arc::ptr_eq(&first, &hit));
    }
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

    locator.move_to(north_of(DELHI, 8.0));
    let moved = cache.get(&dog_high(), false).await;
    assert!(!Arc::ptr_eq(&first, &moved));
    assert_eq!(moved.position.as_ref().and_then(Position::city), Some("delhi"));
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn configured_helpline_is_served_on_failure() {
    let generator = FakeGenerator::new(Behaviour::Fail, Duration::ZERO);
    let cache = cache_with_settings(
        MovableLocator::at(Some(DELHI)),
        Arc::new(NoGeocoder),
        generator,
        CacheSettings::default().with_helpline(city_helpline()),
    );

    let set = cache.get(&dog_high(), false).await;

    assert!(set.fallback_used);
    assert_eq!(set.providers[0].provider, city_helpline());
}

#[tokio::test]
async fn configured_helpline_replaces_unmatched_candidates() {
    let generator = FakeGenerator::new(
        Behaviour::Providers(vec![provider("Bird Aid", "birds", DELHI)]),
        Duration::ZERO,
    );
    let cache = cache_with_settings(
        MovableLocator::at(Some(DELHI)),
        Arc::new(NoGeocoder),
        generator,
        CacheSettings::default().with_helpline(city_helpline()),
    );

    let set = cache.get(&dog_high(), false).await;

    assert!(set.fallback_used);
    assert_eq!(set.providers.len(), 1);
    assert_eq!(set.providers[0].provider.phone, "155");
}

#[tokio::test]
async fn result_limit_caps_ranked_providers() {
    let generator = FakeGenerator::new(delhi_providers(), Duration::ZERO);
    let mut settings = CacheSettings::default();
    settings.match_options.limit = Some(1);
    let cache = cache_with_settings(
        MovableLocator::at(Some(DELHI)),
        Arc::new(NoGeocoder),
        generator,
        settings,
    );

    let set = cache.get(&MatchCriteria::new("all", UrgencyTier::Standard), false).await;

    assert!(!set.fallback_used);
    assert_eq!(set.providers.len(), 1);
}
