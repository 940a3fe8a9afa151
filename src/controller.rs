//! Orchestration between the state container and the data access layer
//!
//! [`DashboardController`] reads the location from the [`WeatherStore`], asks the
//! [`WeatherService`] for data, and writes results or user-facing errors back. A newer
//! request supersedes an older one by cancelling its token; superseded requests never
//! touch the store.

use crate::models::{CitySuggestion, Coordinates, normalize_query};
use crate::service::WeatherService;
use crate::store::WeatherStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Token of the request currently owning a store slot, with what it was issued for
struct InFlight<K> {
    key: K,
    token: CancellationToken,
}

pub struct DashboardController {
    store: Arc<WeatherStore>,
    service: Arc<WeatherService>,
    weather_request: Mutex<Option<InFlight<Coordinates>>>,
    search_request: Mutex<Option<InFlight<String>>>,
}

impl DashboardController {
    #[must_use]
    pub fn new(store: Arc<WeatherStore>, service: Arc<WeatherService>) -> Self {
        Self {
            store,
            service,
            weather_request: Mutex::new(None),
            search_request: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<WeatherStore> {
        &self.store
    }

    #[must_use]
    pub fn service(&self) -> &Arc<WeatherService> {
        &self.service
    }

    /// Fetch weather for the store's current coordinates and publish the outcome.
    ///
    /// A refresh for the same coordinates as the one in flight joins it instead of
    /// cancelling it, since both would share one provider request anyway.
    pub async fn refresh_weather(&self) {
        let coordinates = self.store.select(|s| s.coordinates);
        let token = begin(&self.weather_request, coordinates, |a, b| a.approx_eq(b));

        self.store.set_loading(true);
        let result = self.service.fetch_weather(coordinates, Some(&token)).await;
        if token.is_cancelled() {
            debug!("Weather refresh for {} superseded", coordinates.format_coordinates());
            return;
        }

        match result {
            Ok(snapshot) => {
                self.store.set_weather_data(Some(snapshot));
                self.store.set_error(None);
            }
            Err(e) => {
                warn!("Weather refresh for {} failed: {}", coordinates.format_coordinates(), e);
                self.store.set_error(Some(e.user_message()));
            }
        }
        self.store.set_loading(false);
    }

    /// Record the query text and, when it is long enough, publish matching cities
    pub async fn search(&self, query: &str) {
        self.store.set_search_query(query);

        if query.trim().chars().count() < self.service.min_query_chars() {
            cancel(&self.search_request);
            self.store.set_city_suggestions(Vec::new());
            self.store.set_searching(false);
            return;
        }

        let token = begin(&self.search_request, normalize_query(query), |a, b| a == b);
        self.store.set_searching(true);
        let result = self.service.search_cities(query, Some(&token)).await;
        if token.is_cancelled() {
            debug!("Search for '{}' superseded", query);
            return;
        }

        match result {
            Ok(suggestions) => {
                self.store.set_city_suggestions(suggestions);
                self.store.set_error(None);
            }
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                self.store.set_city_suggestions(Vec::new());
                self.store.set_error(Some(e.user_message()));
            }
        }
        self.store.set_searching(false);
    }

    /// Switch to a place picked from the suggestions
    pub async fn select_city(&self, city: &CitySuggestion) {
        cancel(&self.search_request);
        let moved = self.store.update_location(city.lat, city.lon);
        self.store.set_search_query("");
        self.store.set_city_suggestions(Vec::new());
        self.store.set_searching(false);

        if moved || self.store.select(|s| s.weather_data.is_none()) {
            self.refresh_weather().await;
        }
    }

    /// Follow a position reported by the device
    pub async fn use_device_location(&self, coordinates: Coordinates) {
        cancel(&self.search_request);
        self.store.trigger_current_location();
        self.store.set_coordinates(coordinates);
        self.refresh_weather().await;
    }

    /// Answer to the location permission prompt.
    ///
    /// On denial the store falls back to the default location, which is fetched right away;
    /// on approval the device position is expected through [`Self::use_device_location`].
    pub async fn handle_permission(&self, allow: bool) {
        self.store.handle_location_permission(allow);
        if !allow {
            self.refresh_weather().await;
        }
    }

    /// Drop all outstanding requests and return the store to its initial state
    pub fn reset(&self) {
        cancel(&self.weather_request);
        cancel(&self.search_request);
        self.store.reset();
    }
}

/// Token for a request on `key`: reused when the live request has an equal key,
/// otherwise the live one is cancelled and replaced
fn begin<K>(slot: &Mutex<Option<InFlight<K>>>, key: K, same: impl Fn(&K, &K) -> bool) -> CancellationToken {
    let mut slot = slot.lock();
    if let Some(current) = slot.as_ref() {
        if !current.token.is_cancelled() && same(&current.key, &key) {
            return current.token.clone();
        }
        current.token.cancel();
    }
    let token = CancellationToken::new();
    *slot = Some(InFlight {
        key,
        token: token.clone(),
    });
    token
}

fn cancel<K>(slot: &Mutex<Option<InFlight<K>>>) {
    if let Some(current) = slot.lock().take() {
        current.token.cancel();
    }
}
