//! Skyboard - core of a weather dashboard
//!
//! This library provides the data access layer (cached, coalesced weather and city
//! search requests) and the observable application state the dashboard renders from.

pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export core types for public API
pub use cache::RequestCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DashboardConfig;
pub use controller::DashboardController;
pub use error::{DashboardError, ErrorCode};
pub use models::{CitySuggestion, Coordinates, Unit, WeatherSnapshot};
pub use provider::{OpenWeatherClient, WeatherProvider};
pub use service::{CacheStats, WeatherService};
pub use store::{ApplicationState, StateField, SubscriptionId, WeatherStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, DashboardError>;
