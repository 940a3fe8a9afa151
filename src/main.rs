use anyhow::{Context, Result};
use skyboard::models::Forecast;
use skyboard::{DashboardConfig, DashboardController, OpenWeatherClient, StateField, WeatherService, WeatherStore};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = DashboardConfig::load().context("Failed to load configuration")?;
    skyboard::logging::init(&config.logging);

    let client = OpenWeatherClient::new(&config.provider)?;
    let service = Arc::new(WeatherService::new(
        Arc::new(client),
        &config.cache,
        config.search.clone(),
    ));
    let store = Arc::new(WeatherStore::new(config.defaults.coordinates()));
    store.subscribe(&[StateField::Error], |state| {
        if let Some(message) = &state.error {
            warn!("Dashboard error: {}", message);
        }
    });
    let controller = DashboardController::new(Arc::clone(&store), service);

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        controller.handle_permission(false).await;
    } else {
        controller.search(&query).await;
        let first = store.select(|s| s.city_suggestions.first().cloned());
        match first {
            Some(city) => {
                info!("Using {}", city.display_name());
                controller.select_city(&city).await;
            }
            None => {
                warn!("No place matches '{}', using default location", query);
                controller.handle_permission(false).await;
            }
        }
    }

    let state = store.snapshot();
    let Some(snapshot) = state.weather_data else {
        anyhow::bail!("No weather data available");
    };

    let current = &snapshot.current;
    info!(
        "{} ({}): {}, {}, humidity {}%, wind {}",
        current.place_name,
        snapshot.coordinates.format_coordinates(),
        current.description,
        current.format_temperature(snapshot.unit),
        current.humidity,
        current.format_wind(snapshot.unit),
    );
    info!(
        "Air quality: {} (AQI {})",
        snapshot.air_quality.level.label(),
        snapshot.air_quality.aqi
    );
    log_forecast(&snapshot.forecast);

    Ok(())
}

fn log_forecast(forecast: &Forecast) {
    for day in forecast.days() {
        if let Some((low, high)) = forecast.temperature_range(day) {
            info!("  {}: {:.0} to {:.0}", day, low, high);
        }
    }
}
