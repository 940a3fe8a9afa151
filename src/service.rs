//! Data access layer: weather snapshots and city search behind request caches.
//!
//! Callers share one [`WeatherService`] (typically inside an `Arc`). Both operations
//! answer from a live cache entry when possible, otherwise join an in-flight request for
//! the same key, otherwise start one. No operation retries on its own.

use crate::cache::RequestCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, SearchConfig};
use crate::models::{CitySuggestion, Coordinates, WeatherSnapshot, normalize_query};
use crate::provider::WeatherProvider;
use crate::{DashboardError, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Prefix of every weather cache key
pub const WEATHER_KEY_PREFIX: &str = "weather:";
/// Prefix of every city search cache key
pub const CITIES_KEY_PREFIX: &str = "cities:";

/// Diagnostic view of both caches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries across both caches, expired ones included
    pub entries: usize,
    pub keys: Vec<String>,
}

pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    weather: RequestCache<WeatherSnapshot>,
    cities: RequestCache<Vec<CitySuggestion>>,
    search: SearchConfig,
}

impl WeatherService {
    /// Create a service using the system clock
    #[must_use]
    pub fn new(provider: Arc<dyn WeatherProvider>, cache: &CacheConfig, search: SearchConfig) -> Self {
        Self::with_clock(provider, cache, search, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        provider: Arc<dyn WeatherProvider>,
        cache: &CacheConfig,
        search: SearchConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            weather: RequestCache::new("weather", cache.ttl(), Arc::clone(&clock)),
            cities: RequestCache::new("cities", cache.ttl(), clock),
            search,
        }
    }

    /// Current conditions, forecast and air quality for `coordinates`, fetched as one unit.
    ///
    /// The three provider calls run concurrently; the snapshot only exists once all three
    /// succeed. Triggering `cancel` yields [`DashboardError::Cancelled`]; if this call started
    /// the request, the provider calls are aborted too.
    #[instrument(skip(self, cancel), fields(lat = coordinates.lat, lon = coordinates.lon))]
    pub async fn fetch_weather(
        &self,
        coordinates: Coordinates,
        cancel: Option<&CancellationToken>,
    ) -> Result<WeatherSnapshot> {
        if !coordinates.is_finite() {
            return Err(DashboardError::validation(format!(
                "coordinates must be finite, got {}, {}",
                coordinates.lat, coordinates.lon
            )));
        }

        let key = coordinates.cache_key();
        let provider = Arc::clone(&self.provider);

        self.weather
            .get_or_fetch(&key, cancel, move || async move {
                let start_time = Instant::now();
                let (current, forecast, air_quality) = tokio::try_join!(
                    provider.current_conditions(coordinates),
                    provider.forecast(coordinates),
                    provider.air_quality(coordinates),
                )?;
                info!(
                    "Fetched weather snapshot for {} in {:.3}s",
                    coordinates.format_coordinates(),
                    start_time.elapsed().as_secs_f64()
                );
                Ok::<_, DashboardError>(WeatherSnapshot {
                    coordinates,
                    current,
                    forecast,
                    air_quality,
                    unit: provider.unit(),
                    fetched_at: Utc::now(),
                })
            })
            .await
    }

    /// Up to `max_results` places matching `query`, in provider order.
    ///
    /// Queries shorter than the configured floor after trimming return an empty list
    /// without touching the cache or the network.
    #[instrument(skip(self, cancel))]
    pub async fn search_cities(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<CitySuggestion>> {
        let trimmed = query.trim();
        if trimmed.chars().count() < self.search.min_query_chars {
            debug!("Query below search floor, skipping");
            return Ok(Vec::new());
        }

        let key = format!("{CITIES_KEY_PREFIX}{}", normalize_query(trimmed));
        let provider = Arc::clone(&self.provider);
        let query = trimmed.to_string();
        let limit = self.search.max_results;

        self.cities
            .get_or_fetch(&key, cancel, move || async move { provider.search_cities(&query, limit).await })
            .await
    }

    /// Empty both caches and forget every in-flight request
    pub fn clear_all(&self) {
        self.weather.clear_all();
        self.cities.clear_all();
        info!("Cleared all caches");
    }

    /// Remove cache entries whose key contains `pattern`; returns how many were removed
    pub fn clear_matching(&self, pattern: &str) -> usize {
        let removed = self.weather.clear_matching(pattern) + self.cities.clear_matching(pattern);
        info!("Cleared {} cache entries matching '{}'", removed, pattern);
        removed
    }

    /// For diagnostics only
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut keys = self.weather.keys();
        keys.extend(self.cities.keys());
        keys.sort();
        CacheStats {
            entries: keys.len(),
            keys,
        }
    }

    /// Shortest trimmed query that reaches the provider
    #[must_use]
    pub fn min_query_chars(&self) -> usize {
        self.search.min_query_chars
    }

    /// Whether a weather fetch for `coordinates` is currently in flight
    #[must_use]
    pub fn is_weather_pending(&self, coordinates: Coordinates) -> bool {
        self.weather.is_pending(&coordinates.cache_key())
    }
}
