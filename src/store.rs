//! Application state container
//!
//! [`WeatherStore`] owns the single [`ApplicationState`] record. All mutation goes through
//! its actions; each action is applied atomically under a lock, diffed against the previous
//! state, and then every subscriber watching at least one changed field is called exactly
//! once, synchronously, after the lock has been released.

use crate::models::{CitySuggestion, Coordinates, Unit, WeatherSnapshot};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Fields a subscriber can watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateField {
    Coordinates,
    WeatherData,
    Unit,
    IsLoading,
    Error,
    ShowLocationDialog,
    IsManualSelection,
    GeolocationEnabled,
    HasInitialLoad,
    SearchQuery,
    CitySuggestions,
    IsSearching,
}

impl StateField {
    pub const ALL: [StateField; 12] = [
        StateField::Coordinates,
        StateField::WeatherData,
        StateField::Unit,
        StateField::IsLoading,
        StateField::Error,
        StateField::ShowLocationDialog,
        StateField::IsManualSelection,
        StateField::GeolocationEnabled,
        StateField::HasInitialLoad,
        StateField::SearchQuery,
        StateField::CitySuggestions,
        StateField::IsSearching,
    ];
}

/// Everything the dashboard views render from
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationState {
    pub coordinates: Coordinates,
    pub weather_data: Option<WeatherSnapshot>,
    pub unit: Unit,
    pub is_loading: bool,
    pub error: Option<String>,
    pub show_location_dialog: bool,
    /// Location picked through search; never true together with `geolocation_enabled`
    pub is_manual_selection: bool,
    pub geolocation_enabled: bool,
    /// Goes false -> true once per session; only `reset` brings it back
    pub has_initial_load: bool,
    pub search_query: String,
    pub city_suggestions: Vec<CitySuggestion>,
    pub is_searching: bool,
}

impl ApplicationState {
    /// State at application start: default location, permission dialog shown, nothing loaded
    #[must_use]
    pub fn initial(default_coordinates: Coordinates) -> Self {
        Self {
            coordinates: default_coordinates,
            weather_data: None,
            unit: Unit::default(),
            is_loading: false,
            error: None,
            show_location_dialog: true,
            is_manual_selection: false,
            geolocation_enabled: false,
            has_initial_load: false,
            search_query: String::new(),
            city_suggestions: Vec::new(),
            is_searching: false,
        }
    }

    /// Fields whose values differ between `self` and `other`
    #[must_use]
    pub fn changed_fields(&self, other: &ApplicationState) -> Vec<StateField> {
        StateField::ALL
            .into_iter()
            .filter(|field| !self.field_eq(other, *field))
            .collect()
    }

    fn field_eq(&self, other: &ApplicationState, field: StateField) -> bool {
        match field {
            StateField::Coordinates => self.coordinates == other.coordinates,
            StateField::WeatherData => self.weather_data == other.weather_data,
            StateField::Unit => self.unit == other.unit,
            StateField::IsLoading => self.is_loading == other.is_loading,
            StateField::Error => self.error == other.error,
            StateField::ShowLocationDialog => self.show_location_dialog == other.show_location_dialog,
            StateField::IsManualSelection => self.is_manual_selection == other.is_manual_selection,
            StateField::GeolocationEnabled => self.geolocation_enabled == other.geolocation_enabled,
            StateField::HasInitialLoad => self.has_initial_load == other.has_initial_load,
            StateField::SearchQuery => self.search_query == other.search_query,
            StateField::CitySuggestions => self.city_suggestions == other.city_suggestions,
            StateField::IsSearching => self.is_searching == other.is_searching,
        }
    }
}

/// Handle returned by [`WeatherStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&ApplicationState) + Send + Sync>;

struct Subscriber {
    fields: Vec<StateField>,
    listener: Listener,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: BTreeMap<SubscriptionId, Subscriber>,
}

pub struct WeatherStore {
    initial: ApplicationState,
    state: Mutex<ApplicationState>,
    subscribers: Mutex<Subscribers>,
}

impl fmt::Debug for WeatherStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherStore")
            .field("state", &*self.state.lock())
            .field("subscribers", &self.subscribers.lock().entries.len())
            .finish()
    }
}

impl WeatherStore {
    #[must_use]
    pub fn new(default_coordinates: Coordinates) -> Self {
        let initial = ApplicationState::initial(default_coordinates);
        Self {
            state: Mutex::new(initial.clone()),
            initial,
            subscribers: Mutex::new(Subscribers::default()),
        }
    }

    /// The system default location
    #[must_use]
    pub fn default_coordinates(&self) -> Coordinates {
        self.initial.coordinates
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> ApplicationState {
        self.state.lock().clone()
    }

    /// Read one projection of the state without cloning the whole record
    pub fn select<R>(&self, selector: impl FnOnce(&ApplicationState) -> R) -> R {
        selector(&self.state.lock())
    }

    /// Call `listener` after every action that changes at least one of `fields`
    pub fn subscribe<F>(&self, fields: &[StateField], listener: F) -> SubscriptionId
    where
        F: Fn(&ApplicationState) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.lock();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.entries.insert(
            id,
            Subscriber {
                fields: fields.to_vec(),
                listener: Arc::new(listener),
            },
        );
        id
    }

    /// Returns false when the id was unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().entries.remove(&id).is_some()
    }

    /// Apply `mutate` atomically, then notify watchers of the changed fields
    fn apply(&self, action: &'static str, mutate: impl FnOnce(&mut ApplicationState)) -> bool {
        let (changed, snapshot) = {
            let mut state = self.state.lock();
            let before = state.clone();
            mutate(&mut state);
            let changed = before.changed_fields(&state);
            if changed.is_empty() {
                debug!(action, "State unchanged");
                return false;
            }
            (changed, state.clone())
        };
        debug!(action, changed = ?changed, "State updated");

        let listeners: Vec<Listener> = self
            .subscribers
            .lock()
            .entries
            .values()
            .filter(|s| s.fields.iter().any(|f| changed.contains(f)))
            .map(|s| Arc::clone(&s.listener))
            .collect();

        for listener in listeners {
            listener(&snapshot);
        }
        true
    }

    pub fn set_coordinates(&self, coordinates: Coordinates) {
        self.apply("set_coordinates", |s| s.coordinates = coordinates);
    }

    pub fn set_weather_data(&self, weather_data: Option<WeatherSnapshot>) {
        self.apply("set_weather_data", |s| s.weather_data = weather_data);
    }

    pub fn set_unit(&self, unit: Unit) {
        self.apply("set_unit", |s| s.unit = unit);
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.apply("set_loading", |s| s.is_loading = is_loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.apply("set_error", |s| s.error = error);
    }

    pub fn set_show_location_dialog(&self, show: bool) {
        self.apply("set_show_location_dialog", |s| s.show_location_dialog = show);
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.apply("set_search_query", |s| s.search_query = query);
    }

    pub fn set_city_suggestions(&self, suggestions: Vec<CitySuggestion>) {
        self.apply("set_city_suggestions", |s| s.city_suggestions = suggestions);
    }

    pub fn set_searching(&self, is_searching: bool) {
        self.apply("set_searching", |s| s.is_searching = is_searching);
    }

    /// Manual selection of a location.
    ///
    /// Ignored (returns false) when the coordinates are within tolerance of the current ones,
    /// so noisy repeated reads do not trigger downstream fetches.
    pub fn update_location(&self, lat: f64, lon: f64) -> bool {
        let target = Coordinates::new(lat, lon);
        if self.select(|s| s.coordinates.approx_eq(&target)) {
            debug!(lat, lon, "Location within tolerance, ignoring");
            return false;
        }
        self.apply("update_location", |s| {
            // Re-checked under the lock in case another action moved the location meanwhile
            if s.coordinates.approx_eq(&target) {
                return;
            }
            s.coordinates = target;
            s.is_manual_selection = true;
            s.geolocation_enabled = false;
            s.has_initial_load = true;
            s.error = None;
        })
    }

    /// Switch to device location, abandoning any manual search in progress
    pub fn trigger_current_location(&self) {
        self.apply("trigger_current_location", |s| {
            s.is_manual_selection = false;
            s.geolocation_enabled = true;
            s.has_initial_load = true;
            s.search_query.clear();
            s.city_suggestions.clear();
            s.error = None;
        });
    }

    /// Outcome of the location permission prompt.
    ///
    /// Allowing leaves the coordinates alone (device location arrives separately);
    /// denying falls back to the default location in manual mode.
    pub fn handle_location_permission(&self, allow: bool) {
        let default_coordinates = self.initial.coordinates;
        self.apply("handle_location_permission", |s| {
            s.show_location_dialog = false;
            if allow {
                s.geolocation_enabled = true;
                s.is_manual_selection = false;
            } else {
                s.geolocation_enabled = false;
                s.is_manual_selection = true;
                s.coordinates = default_coordinates;
            }
        });
    }

    /// Back to the state the store was created with
    pub fn reset(&self) {
        let initial = self.initial.clone();
        self.apply("reset", |s| *s = initial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DEFAULT: Coordinates = Coordinates {
        lat: 51.5074,
        lon: -0.1278,
    };

    fn counter(store: &WeatherStore, fields: &[StateField]) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        store.subscribe(fields, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    fn city() -> CitySuggestion {
        CitySuggestion {
            name: "Paris".to_string(),
            country: "FR".to_string(),
            lat: 48.8566,
            lon: 2.3522,
        }
    }

    #[test]
    fn test_initial_state() {
        let store = WeatherStore::new(DEFAULT);
        let state = store.snapshot();
        assert_eq!(state, ApplicationState::initial(DEFAULT));
        assert!(state.show_location_dialog);
        assert!(!state.has_initial_load);
        assert!(state.weather_data.is_none());
        assert!(state.search_query.is_empty());
    }

    #[test]
    fn test_update_location_sets_manual_mode() {
        let store = WeatherStore::new(DEFAULT);
        store.set_error(Some("boom".to_string()));

        assert!(store.update_location(12.9, 77.6));

        let state = store.snapshot();
        assert_eq!(state.coordinates, Coordinates::new(12.9, 77.6));
        assert!(state.is_manual_selection);
        assert!(!state.geolocation_enabled);
        assert!(state.has_initial_load);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_update_location_within_tolerance_is_noop() {
        let store = WeatherStore::new(DEFAULT);
        store.update_location(12.900_000, 77.600_000);
        store.set_error(Some("stale".to_string()));
        let before = store.snapshot();
        let notified = counter(&store, &StateField::ALL);

        assert!(!store.update_location(12.900_000_1, 77.600_000_1));

        assert_eq!(store.snapshot(), before);
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_trigger_current_location_abandons_search() {
        let store = WeatherStore::new(DEFAULT);
        store.update_location(12.9, 77.6);
        store.set_search_query("Par");
        store.set_city_suggestions(vec![city()]);
        store.set_error(Some("boom".to_string()));

        store.trigger_current_location();

        let state = store.snapshot();
        assert!(!state.is_manual_selection);
        assert!(state.geolocation_enabled);
        assert!(state.has_initial_load);
        assert!(state.search_query.is_empty());
        assert!(state.city_suggestions.is_empty());
        assert!(state.error.is_none());
        assert_eq!(state.coordinates, Coordinates::new(12.9, 77.6));
    }

    #[test]
    fn test_permission_denied_falls_back_to_default() {
        let store = WeatherStore::new(DEFAULT);
        store.trigger_current_location();
        store.set_coordinates(Coordinates::new(40.0, -74.0));

        store.handle_location_permission(false);

        let state = store.snapshot();
        assert!(!state.show_location_dialog);
        assert!(!state.geolocation_enabled);
        assert!(state.is_manual_selection);
        assert_eq!(state.coordinates, DEFAULT);
    }

    #[test]
    fn test_permission_allowed_keeps_coordinates() {
        let store = WeatherStore::new(DEFAULT);
        store.update_location(12.9, 77.6);

        store.handle_location_permission(true);

        let state = store.snapshot();
        assert!(!state.show_location_dialog);
        assert!(state.geolocation_enabled);
        assert!(!state.is_manual_selection);
        assert_eq!(state.coordinates, Coordinates::new(12.9, 77.6));
    }

    #[test]
    fn test_manual_and_geolocation_never_both_true() {
        let store = WeatherStore::new(DEFAULT);
        let check = |store: &WeatherStore| {
            let s = store.snapshot();
            assert!(!(s.is_manual_selection && s.geolocation_enabled));
        };

        store.handle_location_permission(true);
        check(&store);
        store.update_location(1.0, 1.0);
        check(&store);
        store.trigger_current_location();
        check(&store);
        store.handle_location_permission(false);
        check(&store);
        store.update_location(2.0, 2.0);
        check(&store);
    }

    #[test]
    fn test_has_initial_load_is_monotonic() {
        let store = WeatherStore::new(DEFAULT);
        store.update_location(1.0, 1.0);
        store.handle_location_permission(false);
        store.set_loading(true);
        store.set_error(None);
        assert!(store.snapshot().has_initial_load);

        store.reset();
        assert!(!store.snapshot().has_initial_load);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let store = WeatherStore::new(DEFAULT);
        store.handle_location_permission(true);
        store.update_location(12.9, 77.6);
        store.set_unit(Unit::Imperial);
        store.set_loading(true);
        store.set_error(Some("boom".to_string()));
        store.set_search_query("Paris");
        store.set_city_suggestions(vec![city()]);
        store.set_searching(true);

        store.reset();

        assert_eq!(store.snapshot(), ApplicationState::initial(DEFAULT));
    }

    #[test]
    fn test_subscribers_only_see_their_fields() {
        let store = WeatherStore::new(DEFAULT);
        let coordinates = counter(&store, &[StateField::Coordinates]);
        let loading = counter(&store, &[StateField::IsLoading]);
        let search = counter(&store, &[StateField::SearchQuery, StateField::CitySuggestions]);

        store.set_loading(true);
        store.set_loading(true);
        assert_eq!(loading.load(Ordering::SeqCst), 1);
        assert_eq!(coordinates.load(Ordering::SeqCst), 0);

        store.update_location(12.9, 77.6);
        assert_eq!(coordinates.load(Ordering::SeqCst), 1);

        // One action touching two watched fields notifies once
        store.set_search_query("Par");
        store.set_city_suggestions(vec![city()]);
        store.trigger_current_location();
        assert_eq!(search.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = WeatherStore::new(DEFAULT);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let id = store.subscribe(&[StateField::Error], move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.set_error(Some("a".to_string()));
        assert!(store.unsubscribe(id));
        store.set_error(Some("b".to_string()));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn test_listener_sees_post_action_state_and_may_reenter() {
        let store = Arc::new(WeatherStore::new(DEFAULT));
        let observed = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&observed);
        let inner = Arc::downgrade(&store);
        store.subscribe(&[StateField::Coordinates], move |state| {
            sink.lock().push((state.coordinates, state.is_manual_selection));
            // Reading back from inside a callback must not deadlock
            if let Some(store) = inner.upgrade() {
                assert_eq!(store.snapshot().coordinates, state.coordinates);
            }
        });

        store.update_location(12.9, 77.6);

        assert_eq!(*observed.lock(), vec![(Coordinates::new(12.9, 77.6), true)]);
    }
}
