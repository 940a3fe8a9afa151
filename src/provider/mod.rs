//! Weather provider seam
//!
//! The data access layer talks to the outside world only through [`WeatherProvider`].
//! Implementations normalize provider payloads into the crate's models and classify
//! every failure as a [`crate::DashboardError`].

use crate::Result;
use crate::models::{AirQuality, CitySuggestion, Coordinates, CurrentConditions, Forecast, Unit};
use async_trait::async_trait;

pub mod openweather;

pub use openweather::OpenWeatherClient;

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions at the coordinate
    async fn current_conditions(&self, coordinates: Coordinates) -> Result<CurrentConditions>;

    /// Multi-period forecast at the coordinate
    async fn forecast(&self, coordinates: Coordinates) -> Result<Forecast>;

    /// Latest air pollution reading at the coordinate
    async fn air_quality(&self, coordinates: Coordinates) -> Result<AirQuality>;

    /// Up to `limit` places matching `query`, in the provider's relevance order
    async fn search_cities(&self, query: &str, limit: usize) -> Result<Vec<CitySuggestion>>;

    /// Unit system the provider answers in
    fn unit(&self) -> Unit;
}
