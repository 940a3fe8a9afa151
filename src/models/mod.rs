//! Data models for the Skyboard dashboard core
//!
//! This module contains the core domain models organized by concern:
//! - Location: Coordinates and city search suggestions
//! - Weather: Current conditions, air quality and the combined snapshot
//! - Forecast: Multi-period forecast collections and utilities

pub mod forecast;
pub mod location;
pub mod weather;

// Re-export all public types for convenient access
pub use forecast::{Forecast, ForecastPeriod};
pub use location::{COORDINATE_TOLERANCE, CitySuggestion, Coordinates, normalize_query};
pub use weather::{AirQuality, AqiLevel, CurrentConditions, Unit, WeatherSnapshot};
