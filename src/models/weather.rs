//! Current conditions, air quality and the combined weather snapshot

use super::{Coordinates, Forecast};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit system for provider requests and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
}

impl Unit {
    /// Value of the provider's `units` query parameter
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    #[must_use]
    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Unit::Metric => "°C",
            Unit::Imperial => "°F",
        }
    }

    #[must_use]
    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Unit::Metric => "m/s",
            Unit::Imperial => "mph",
        }
    }
}

/// Current conditions at one coordinate
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Place name reported by the provider (may be empty)
    pub place_name: String,
    /// Observation time
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Relative humidity percentage (0-100)
    pub humidity: u8,
    /// Atmospheric pressure in hPa
    pub pressure: f64,
    pub wind_speed: f64,
    /// Wind direction in degrees (0-360, where 0/360 is North)
    pub wind_direction: u16,
    /// Visibility in meters, when reported
    pub visibility: Option<u32>,
    /// Human-readable description of weather conditions
    pub description: String,
    /// Weather condition icon ID from the provider
    pub icon: String,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

impl CurrentConditions {
    /// Convert wind direction from degrees to cardinal direction
    #[must_use]
    pub fn wind_direction_to_cardinal(degrees: u16) -> &'static str {
        const POINTS: [&str; 16] = [
            "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W",
            "WNW", "NW", "NNW",
        ];
        if degrees > 360 {
            return "Unknown";
        }
        let index = ((f64::from(degrees) / 22.5).round() as usize) % POINTS.len();
        POINTS[index]
    }

    #[must_use]
    pub fn format_temperature(&self, unit: Unit) -> String {
        format!("{:.1}{}", self.temperature, unit.temperature_symbol())
    }

    #[must_use]
    pub fn format_wind(&self, unit: Unit) -> String {
        format!(
            "{:.1} {} {}",
            self.wind_speed,
            unit.speed_symbol(),
            Self::wind_direction_to_cardinal(self.wind_direction)
        )
    }
}

/// Qualitative air quality index band (provider scale 1..=5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiLevel {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

impl AqiLevel {
    /// `None` for indices outside the provider's 1..=5 scale
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::Good),
            2 => Some(Self::Fair),
            3 => Some(Self::Moderate),
            4 => Some(Self::Poor),
            5 => Some(Self::VeryPoor),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

/// Air pollution reading, concentrations in μg/m³
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AirQuality {
    pub measured_at: DateTime<Utc>,
    pub aqi: u8,
    pub level: AqiLevel,
    pub co: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
}

/// Current conditions, forecast and air quality fetched together for one coordinate.
/// Only ever built once all three parts have arrived.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub coordinates: Coordinates,
    pub current: CurrentConditions,
    pub forecast: Forecast,
    pub air_quality: AirQuality,
    /// Unit system the provider answered in
    pub unit: Unit,
    pub fetched_at: DateTime<Utc>,
}
