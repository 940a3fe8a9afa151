//! Multi-period weather forecast

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One forecast period (the provider reports 3-hour steps)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ForecastPeriod {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub description: String,
    pub icon: String,
    /// Probability of precipitation (0.0-1.0)
    pub precipitation_probability: f64,
    pub wind_speed: f64,
}

/// Forecast periods sorted by timestamp
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Forecast {
    pub periods: Vec<ForecastPeriod>,
    /// UTC offset of the forecast location, in seconds
    pub timezone_offset_seconds: i32,
}

impl Forecast {
    #[must_use]
    pub fn new(mut periods: Vec<ForecastPeriod>, timezone_offset_seconds: i32) -> Self {
        periods.sort_by_key(|p| p.timestamp);
        Self {
            periods,
            timezone_offset_seconds,
        }
    }

    /// Distinct calendar days covered, in order
    #[must_use]
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self.periods.iter().map(|p| p.timestamp.date_naive()).collect();
        days.dedup();
        days
    }

    /// All periods on the given day
    #[must_use]
    pub fn periods_on(&self, day: NaiveDate) -> Vec<&ForecastPeriod> {
        self.periods
            .iter()
            .filter(|p| p.timestamp.date_naive() == day)
            .collect()
    }

    /// (min, max) temperature for a day, if any period falls on it
    #[must_use]
    pub fn temperature_range(&self, day: NaiveDate) -> Option<(f64, f64)> {
        self.periods_on(day).iter().fold(None, |acc, p| match acc {
            None => Some((p.temperature, p.temperature)),
            Some((min, max)) => Some((min.min(p.temperature), max.max(p.temperature))),
        })
    }
}
