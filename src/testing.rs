//! Test doubles shared by the unit tests

use crate::models::{
    AirQuality, AqiLevel, CitySuggestion, Coordinates, CurrentConditions, Forecast, ForecastPeriod, Unit,
};
use crate::provider::WeatherProvider;
use crate::{DashboardError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// In-memory provider counting every call; optionally parks until released
#[derive(Default)]
pub(crate) struct FakeProvider {
    pub(crate) weather_calls: AtomicUsize,
    pub(crate) city_calls: AtomicUsize,
    pub(crate) fail_forecast: bool,
    pub(crate) gate: Option<Arc<Notify>>,
}

impl FakeProvider {
    async fn wait_gate(&self) {
        match &self.gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }
    }
}

pub(crate) fn observed() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn current_conditions(&self, coordinates: Coordinates) -> Result<CurrentConditions> {
        self.weather_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        Ok(CurrentConditions {
            place_name: coordinates.format_coordinates(),
            observed_at: observed(),
            temperature: 21.0,
            feels_like: 20.5,
            temp_min: 18.0,
            temp_max: 24.0,
            humidity: 55,
            pressure: 1013.0,
            wind_speed: 3.2,
            wind_direction: 200,
            visibility: Some(10_000),
            description: "clear sky".to_string(),
            icon: "01d".to_string(),
            sunrise: None,
            sunset: None,
        })
    }

    async fn forecast(&self, _coordinates: Coordinates) -> Result<Forecast> {
        tokio::task::yield_now().await;
        if self.fail_forecast {
            return Err(DashboardError::transport_status("request failed", 500));
        }
        Ok(Forecast::new(
            vec![ForecastPeriod {
                timestamp: observed(),
                temperature: 22.0,
                feels_like: 21.0,
                humidity: 50,
                description: "few clouds".to_string(),
                icon: "02d".to_string(),
                precipitation_probability: 0.1,
                wind_speed: 2.5,
            }],
            0,
        ))
    }

    async fn air_quality(&self, _coordinates: Coordinates) -> Result<AirQuality> {
        Ok(AirQuality {
            measured_at: observed(),
            aqi: 2,
            level: AqiLevel::Fair,
            co: 200.0,
            no2: 10.0,
            o3: 50.0,
            so2: 3.0,
            pm2_5: 8.0,
            pm10: 12.0,
        })
    }

    async fn search_cities(&self, query: &str, limit: usize) -> Result<Vec<CitySuggestion>> {
        self.city_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        Ok((0..limit.min(2))
            .map(|i| CitySuggestion {
                name: format!("{query} {i}"),
                country: "FR".to_string(),
                lat: 48.0 + i as f64,
                lon: 2.0,
            })
            .collect())
    }

    fn unit(&self) -> Unit {
        Unit::Metric
    }
}
