//! [`RecommendationCache`]: one cached recommendation set with TTL, drift
//! checks, and single-flight refresh.
//!
//! State lives behind a `std::sync::Mutex` that is only held to inspect or
//! swap it, never across an `.await`. A refresh runs on its own tokio task;
//! callers share it through a [`Shared`] handle, so at most one refresh per
//! epoch is ever running and it completes even if every caller goes away.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use rescuelink_core::{rank_providers, MatchCriteria, Position, RecommendationSet};
use rescuelink_generator::CandidateGenerator;
use rescuelink_geo::{GeoPositionProvider, PositionError};
use tokio::time::Instant;

use crate::drift::has_drifted;
use crate::error::RefreshError;
use crate::fallback::{fallback_guidance, fallback_set};
use crate::settings::CacheSettings;

type SharedRefresh = Shared<BoxFuture<'static, Arc<RecommendationSet>>>;

struct CacheEntry {
    set: Arc<RecommendationSet>,
    fetched_at: Instant,
    position_at_fetch: Option<Position>,
    epoch: u64,
}

struct InFlight {
    id: u64,
    epoch: u64,
    criteria: MatchCriteria,
    handle: SharedRefresh,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    in_flight: Option<InFlight>,
    /// Bumped by every invalidation; entries and flights from older epochs
    /// are never served.
    epoch: u64,
    next_flight_id: u64,
    manual: Option<Position>,
}

struct Inner {
    geo: Arc<GeoPositionProvider>,
    generator: Arc<dyn CandidateGenerator>,
    settings: CacheSettings,
    state: Mutex<CacheState>,
}

enum Step {
    /// Await this refresh and return its result.
    Join(SharedRefresh),
    /// A refresh for another epoch or other criteria is running; let it
    /// finish, then look again.
    Wait(SharedRefresh),
    /// The entry is fresh; confirm the caller has not moved.
    Revalidate {
        set: Arc<RecommendationSet>,
        position_at_fetch: Option<Position>,
        manual: Option<Position>,
    },
}

#[derive(Clone)]
pub struct RecommendationCache {
    inner: Arc<Inner>,
}

impl RecommendationCache {
    #[must_use]
    pub fn new(
        geo: Arc<GeoPositionProvider>,
        generator: Arc<dyn CandidateGenerator>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                geo,
                generator,
                settings,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Current recommendations for `criteria`.
    ///
    /// Returns the cached set (the same `Arc`) while it is younger than the
    /// TTL, was built for the same criteria, and the caller has not drifted.
    /// Otherwise joins or starts a refresh. Never fails: degraded refreshes
    /// produce a set with `fallback_used = true`.
    pub async fn get(&self, criteria: &MatchCriteria, force_refresh: bool) -> Arc<RecommendationSet> {
        let mut drifted_from: Option<Arc<RecommendationSet>> = None;
        let mut resolved: Option<Option<Position>> = None;

        loop {
            match self.next_step(criteria, force_refresh, drifted_from.as_ref(), &mut resolved) {
                Step::Join(handle) => return handle.await,
                Step::Wait(handle) => {
                    tracing::debug!("waiting for a superseded refresh to finish");
                    handle.await;
                }
                Step::Revalidate {
                    set,
                    position_at_fetch,
                    manual,
                } => {
                    let current = match manual {
                        Some(position) => Some(position),
                        None => self.inner.locate_position().await,
                    };
                    if !has_drifted(
                        position_at_fetch.as_ref(),
                        current.as_ref(),
                        self.inner.settings.drift_threshold_km,
                    ) {
                        return set;
                    }
                    tracing::info!(
                        from = %position_label(position_at_fetch.as_ref()),
                        to = %position_label(current.as_ref()),
                        "caller position drifted; refreshing recommendations"
                    );
                    drifted_from = Some(set);
                    resolved = Some(match current {
                        Some(position) => Some(self.inner.geo.label(position).await),
                        None => None,
                    });
                }
            }
        }
    }

    /// Drop the current entry. A refresh already in flight is left to finish
    /// but its result is not stored.
    pub fn invalidate(&self) {
        let mut state = self.inner.lock_state();
        state.epoch += 1;
        state.entry = None;
        tracing::debug!(epoch = state.epoch, "recommendation cache invalidated");
    }

    /// Use `position` instead of device acquisition until [`clear`](Self::clear).
    pub fn set_manual_override(&self, position: Position) {
        let mut state = self.inner.lock_state();
        state.manual = Some(position);
        state.epoch += 1;
        state.entry = None;
    }

    #[must_use]
    pub fn manual_override(&self) -> Option<Position> {
        self.inner.lock_state().manual.clone()
    }

    /// Drop the entry and any manual override.
    pub fn clear(&self) {
        let mut state = self.inner.lock_state();
        state.manual = None;
        state.epoch += 1;
        state.entry = None;
        tracing::debug!(epoch = state.epoch, "recommendation cache cleared");
    }

    /// The current entry's set, if any, without any I/O or validity checks
    /// beyond the epoch.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<RecommendationSet>> {
        let state = self.inner.lock_state();
        state
            .entry
            .as_ref()
            .filter(|entry| entry.epoch == state.epoch)
            .map(|entry| Arc::clone(&entry.set))
    }

    fn next_step(
        &self,
        criteria: &MatchCriteria,
        force_refresh: bool,
        drifted_from: Option<&Arc<RecommendationSet>>,
        resolved: &mut Option<Option<Position>>,
    ) -> Step {
        let mut state = self.inner.lock_state();

        if let Some(flight) = &state.in_flight {
            if flight.epoch == state.epoch && flight.criteria == *criteria {
                return Step::Join(flight.handle.clone());
            }
            return Step::Wait(flight.handle.clone());
        }

        if !force_refresh {
            let fresh = state.entry.as_ref().filter(|entry| {
                entry.epoch == state.epoch
                    && entry.set.criteria == *criteria
                    && entry.fetched_at.elapsed() < self.inner.settings.ttl
                    && !drifted_from.is_some_and(|stale| Arc::ptr_eq(stale, &entry.set))
            });
            if let Some(entry) = fresh {
                return Step::Revalidate {
                    set: Arc::clone(&entry.set),
                    position_at_fetch: entry.position_at_fetch.clone(),
                    manual: state.manual.clone(),
                };
            }
        }

        Step::Join(self.start_refresh(&mut state, criteria, resolved.take()))
    }

    fn start_refresh(
        &self,
        state: &mut CacheState,
        criteria: &MatchCriteria,
        resolved: Option<Option<Position>>,
    ) -> SharedRefresh {
        let id = state.next_flight_id;
        state.next_flight_id += 1;
        let epoch = state.epoch;
        let resolved = resolved.or_else(|| state.manual.clone().map(Some));

        tracing::debug!(
            flight = id,
            epoch,
            specialization = %criteria.specialization,
            urgency = %criteria.urgency_tier,
            "starting recommendation refresh"
        );

        let inner = Arc::clone(&self.inner);
        let task_criteria = criteria.clone();
        let task = tokio::spawn(async move {
            let _guard = FlightGuard {
                inner: Arc::clone(&inner),
                id,
            };
            let set = Arc::new(inner.refresh(&task_criteria, resolved).await);
            inner.store(epoch, Arc::clone(&set));
            set
        });

        let fallback_criteria = criteria.clone();
        let helpline = self.inner.settings.helpline().clone();
        let handle = async move {
            match task.await {
                Ok(set) => set,
                Err(e) => {
                    let err = RefreshError::TaskFailed(e.to_string());
                    tracing::error!(kind = err.kind(), error = %err, "serving fallback set");
                    Arc::new(fallback_set(None, &fallback_criteria, &helpline))
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            id,
            epoch,
            criteria: criteria.clone(),
            handle: handle.clone(),
        });
        handle
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Device position, else a recent fix, else the default region estimate.
    async fn resolve_position(&self) -> Option<Position> {
        let acquired = self.geo.acquire_with_cache().await;
        self.or_estimate(acquired)
    }

    /// [`resolve_position`](Self::resolve_position) without reverse geocoding;
    /// used to check a fresh entry for drift.
    async fn locate_position(&self) -> Option<Position> {
        let located = self.geo.locate_with_cache().await;
        self.or_estimate(located)
    }

    fn or_estimate(&self, result: Result<Position, PositionError>) -> Option<Position> {
        match result {
            Ok(position) => Some(position),
            Err(e) => {
                let err = RefreshError::from(e);
                let estimated = self.geo.default_position();
                tracing::warn!(
                    kind = err.kind(),
                    error = %err,
                    estimated = estimated.is_some(),
                    "device position unavailable"
                );
                estimated
            }
        }
    }

    async fn refresh(
        &self,
        criteria: &MatchCriteria,
        resolved: Option<Option<Position>>,
    ) -> RecommendationSet {
        let position = match resolved {
            Some(position) => position,
            None => self.resolve_position().await,
        };

        let batch = match self.generator.generate(position.as_ref(), criteria).await {
            Ok(batch) => batch,
            Err(e) => {
                let err = RefreshError::from(e);
                tracing::warn!(
                    kind = err.kind(),
                    generator = self.generator.name(),
                    error = %err,
                    has_position = position.is_some(),
                    "serving fallback set"
                );
                return fallback_set(position, criteria, self.settings.helpline());
            }
        };

        let outcome = rank_providers(
            &batch.providers,
            criteria,
            position.as_ref(),
            &self.settings.match_options,
        );
        if outcome.fallback_used {
            let err = RefreshError::NoCandidatesMatched;
            tracing::warn!(
                kind = err.kind(),
                candidates = batch.providers.len(),
                "{err}"
            );
        }

        let guidance = batch
            .guidance
            .or_else(|| outcome.fallback_used.then(fallback_guidance));

        RecommendationSet {
            position,
            providers: outcome.providers,
            generated_at: Utc::now(),
            fallback_used: outcome.fallback_used,
            criteria: criteria.clone(),
            guidance,
        }
    }

    fn store(&self, epoch: u64, set: Arc<RecommendationSet>) {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            tracing::debug!(
                flight_epoch = epoch,
                current_epoch = state.epoch,
                "discarding refresh result from an older epoch"
            );
            return;
        }
        state.entry = Some(CacheEntry {
            position_at_fetch: set.position.clone(),
            set,
            fetched_at: Instant::now(),
            epoch,
        });
    }
}

/// Clears the in-flight slot when the refresh task ends, including by panic.
struct FlightGuard {
    inner: Arc<Inner>,
    id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        if state.in_flight.as_ref().is_some_and(|f| f.id == self.id) {
            state.in_flight = None;
        }
    }
}

fn position_label(position: Option<&Position>) -> String {
    GeoPositionProvider::format_for_display(position)
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
