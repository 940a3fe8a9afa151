//! HTTP client for OpenWeatherMap-compatible endpoints
//!
//! Every response crosses an explicit parse/validate boundary: the body is decoded into
//! wire structs and converted into the crate's models. Anything that does not match the
//! expected shape becomes [`DashboardError::Unexpected`] instead of leaking into the cache.

use super::WeatherProvider;
use crate::config::ProviderConfig;
use crate::models::{AirQuality, CitySuggestion, Coordinates, CurrentConditions, Forecast, Unit};
use crate::{DashboardError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const GENERIC_FAILURE: &str = "request failed";

/// Weather, forecast, air pollution and geocoding client
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    unit: Unit,
}

impl OpenWeatherClient {
    /// Create a new client; the configuration must carry an API key
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| DashboardError::config("Provider API key is required"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("Skyboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DashboardError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            unit: config.units,
        })
    }

    fn coordinate_url(&self, endpoint: &str, coordinates: Coordinates, with_units: bool) -> String {
        let mut url = format!(
            "{}/data/2.5/{}?lat={}&lon={}&appid={}",
            self.base_url,
            endpoint,
            coordinates.lat,
            coordinates.lon,
            urlencoding::encode(&self.api_key)
        );
        if with_units {
            url.push_str("&units=");
            url.push_str(self.unit.as_str());
        }
        url
    }

    /// GET `url` and decode the body, classifying every failure
    #[instrument(skip(self, url))]
    async fn get_json<W: DeserializeOwned>(&self, endpoint: &str, url: &str) -> Result<W> {
        let start_time = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("Network error calling {}: {}", endpoint, e);
            DashboardError::from(e)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!("Failed to read {} response body: {}", endpoint, e);
            DashboardError::transport(GENERIC_FAILURE)
        })?;

        if !status.is_success() {
            let message = wire::provider_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string());
            warn!("Provider returned {} for {}: {}", status, endpoint, message);
            return Err(DashboardError::transport_status(message, status.as_u16()));
        }

        let parsed = serde_json::from_str::<W>(&body).map_err(|e| {
            warn!("Failed to parse {} response: {}", endpoint, e);
            DashboardError::from(e)
        })?;

        debug!(
            "Fetched {} in {:.3}s",
            endpoint,
            start_time.elapsed().as_secs_f64()
        );
        Ok(parsed)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self), fields(lat = coordinates.lat, lon = coordinates.lon))]
    async fn current_conditions(&self, coordinates: Coordinates) -> Result<CurrentConditions> {
        let url = self.coordinate_url("weather", coordinates, true);
        let response: wire::CurrentResponse = self.get_json("weather", &url).await?;
        response.try_into()
    }

    #[instrument(skip(self), fields(lat = coordinates.lat, lon = coordinates.lon))]
    async fn forecast(&self, coordinates: Coordinates) -> Result<Forecast> {
        let url = self.coordinate_url("forecast", coordinates, true);
        let response: wire::ForecastResponse = self.get_json("forecast", &url).await?;
        response.try_into()
    }

    #[instrument(skip(self), fields(lat = coordinates.lat, lon = coordinates.lon))]
    async fn air_quality(&self, coordinates: Coordinates) -> Result<AirQuality> {
        let url = self.coordinate_url("air_pollution", coordinates, false);
        let response: wire::AirPollutionResponse = self.get_json("air_pollution", &url).await?;
        response.try_into()
    }

    #[instrument(skip(self))]
    async fn search_cities(&self, query: &str, limit: usize) -> Result<Vec<CitySuggestion>> {
        // Ties in relevance are broken by population, largest first
        let url = format!(
            "{}/geo/1.0/direct?q={}&limit={}&sort=-population&appid={}",
            self.base_url,
            urlencoding::encode(query),
            limit,
            urlencoding::encode(&self.api_key)
        );
        let results: Vec<wire::GeocodingResult> = self.get_json("geocoding", &url).await?;

        let suggestions: Vec<CitySuggestion> = results
            .into_iter()
            .take(limit)
            .map(CitySuggestion::try_from)
            .collect::<Result<_>>()?;

        info!("Found {} cities for '{}'", suggestions.len(), query);
        Ok(suggestions)
    }

    fn unit(&self) -> Unit {
        self.unit
    }
}

fn timestamp(seconds: i64, field: &str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| DashboardError::unexpected(format!("invalid timestamp in `{field}`")))
}

fn percentage(value: f64, field: &str) -> Result<u8> {
    if (0.0..=100.0).contains(&value) {
        Ok(value.round() as u8)
    } else {
        Err(DashboardError::unexpected(format!("`{field}` out of range: {value}")))
    }
}

fn valid_coordinates(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Provider response structures and conversion into models
mod wire {
    use super::{percentage, timestamp, valid_coordinates};
    use crate::models::{
        AirQuality, AqiLevel, CitySuggestion, CurrentConditions, Forecast, ForecastPeriod,
    };
    use crate::{DashboardError, Result};
    use serde::Deserialize;

    /// `{"cod": 404, "message": "city not found"}`
    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    pub fn provider_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }

    #[derive(Debug, Deserialize)]
    pub struct Condition {
        pub description: String,
        pub icon: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct MainReadings {
        pub temp: f64,
        pub feels_like: f64,
        #[serde(default)]
        pub temp_min: Option<f64>,
        #[serde(default)]
        pub temp_max: Option<f64>,
        #[serde(default)]
        pub pressure: Option<f64>,
        pub humidity: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Wind {
        pub speed: f64,
        #[serde(default)]
        pub deg: Option<f64>,
    }

    #[derive(Debug, Deserialize, Default)]
    pub struct Sys {
        pub sunrise: Option<i64>,
        pub sunset: Option<i64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentResponse {
        pub weather: Vec<Condition>,
        pub main: MainReadings,
        pub wind: Wind,
        pub visibility: Option<u32>,
        pub dt: i64,
        #[serde(default)]
        pub sys: Sys,
        #[serde(default)]
        pub name: String,
    }

    impl TryFrom<CurrentResponse> for CurrentConditions {
        type Error = DashboardError;

        fn try_from(response: CurrentResponse) -> Result<Self> {
            let condition = response
                .weather
                .into_iter()
                .next()
                .ok_or_else(|| DashboardError::unexpected("current weather has no condition"))?;
            let main = response.main;

            Ok(CurrentConditions {
                place_name: response.name,
                observed_at: timestamp(response.dt, "dt")?,
                temperature: main.temp,
                feels_like: main.feels_like,
                temp_min: main.temp_min.unwrap_or(main.temp),
                temp_max: main.temp_max.unwrap_or(main.temp),
                humidity: percentage(main.humidity, "humidity")?,
                pressure: main.pressure.unwrap_or_default(),
                wind_speed: response.wind.speed,
                wind_direction: response.wind.deg.map_or(0, |d| (d.rem_euclid(360.0)) as u16),
                visibility: response.visibility,
                description: condition.description,
                icon: condition.icon,
                sunrise: response.sys.sunrise.map(|s| timestamp(s, "sys.sunrise")).transpose()?,
                sunset: response.sys.sunset.map(|s| timestamp(s, "sys.sunset")).transpose()?,
            })
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastItem {
        pub dt: i64,
        pub main: MainReadings,
        pub weather: Vec<Condition>,
        pub wind: Wind,
        #[serde(default)]
        pub pop: f64,
    }

    #[derive(Debug, Deserialize, Default)]
    pub struct ForecastCity {
        #[serde(default)]
        pub timezone: i32,
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        pub list: Vec<ForecastItem>,
        #[serde(default)]
        pub city: ForecastCity,
    }

    impl TryFrom<ForecastResponse> for Forecast {
        type Error = DashboardError;

        fn try_from(response: ForecastResponse) -> Result<Self> {
            if response.list.is_empty() {
                return Err(DashboardError::unexpected("forecast has no periods"));
            }

            let periods = response
                .list
                .into_iter()
                .map(|item| {
                    let condition = item
                        .weather
                        .into_iter()
                        .next()
                        .ok_or_else(|| DashboardError::unexpected("forecast period has no condition"))?;
                    Ok(ForecastPeriod {
                        timestamp: timestamp(item.dt, "list.dt")?,
                        temperature: item.main.temp,
                        feels_like: item.main.feels_like,
                        humidity: percentage(item.main.humidity, "list.main.humidity")?,
                        description: condition.description,
                        icon: condition.icon,
                        precipitation_probability: item.pop.clamp(0.0, 1.0),
                        wind_speed: item.wind.speed,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Forecast::new(periods, response.city.timezone))
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct AqiMain {
        pub aqi: u8,
    }

    #[derive(Debug, Deserialize)]
    pub struct Components {
        pub co: f64,
        pub no2: f64,
        pub o3: f64,
        pub so2: f64,
        pub pm2_5: f64,
        pub pm10: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct AirPollutionItem {
        pub dt: i64,
        pub main: AqiMain,
        pub components: Components,
    }

    #[derive(Debug, Deserialize)]
    pub struct AirPollutionResponse {
        pub list: Vec<AirPollutionItem>,
    }

    impl TryFrom<AirPollutionResponse> for AirQuality {
        type Error = DashboardError;

        fn try_from(response: AirPollutionResponse) -> Result<Self> {
            let item = response
                .list
                .into_iter()
                .next()
                .ok_or_else(|| DashboardError::unexpected("air pollution reading missing"))?;
            let level = AqiLevel::from_index(item.main.aqi).ok_or_else(|| {
                DashboardError::unexpected(format!("air quality index out of range: {}", item.main.aqi))
            })?;
            let c = item.components;

            Ok(AirQuality {
                measured_at: timestamp(item.dt, "list.dt")?,
                aqi: item.main.aqi,
                level,
                co: c.co,
                no2: c.no2,
                o3: c.o3,
                so2: c.so2,
                pm2_5: c.pm2_5,
                pm10: c.pm10,
            })
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct GeocodingResult {
        pub name: String,
        pub lat: f64,
        pub lon: f64,
        #[serde(default)]
        pub country: String,
    }

    impl TryFrom<GeocodingResult> for CitySuggestion {
        type Error = DashboardError;

        fn try_from(result: GeocodingResult) -> Result<Self> {
            if !valid_coordinates(result.lat, result.lon) {
                return Err(DashboardError::unexpected(format!(
                    "city '{}' has invalid coordinates",
                    result.name
                )));
            }
            Ok(CitySuggestion {
                name: result.name,
                country: result.country,
                lat: result.lat,
                lon: result.lon,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AqiLevel;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenWeatherClient {
        let config = ProviderConfig {
            api_key: Some("test_api_key_123".to_string()),
            base_url: server.uri(),
            timeout_seconds: 5,
            units: Unit::Metric,
        };
        OpenWeatherClient::new(&config).unwrap()
    }

    fn current_body() -> serde_json::Value {
        json!({
            "coord": {"lon": 77.6, "lat": 12.9},
            "weather": [{"id": 801, "main": "Clouds", "description": "few clouds", "icon": "02d"}],
            "main": {"temp": 27.4, "feels_like": 28.1, "temp_min": 26.0, "temp_max": 29.0,
                     "pressure": 1012, "humidity": 61},
            "visibility": 10000,
            "wind": {"speed": 3.6, "deg": 250},
            "dt": 1_717_228_800,
            "sys": {"country": "IN", "sunrise": 1_717_201_800, "sunset": 1_717_248_000},
            "timezone": 19800,
            "name": "Bengaluru"
        })
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = OpenWeatherClient::new(&ProviderConfig::default()).unwrap_err();
        assert!(matches!(err, DashboardError::Config { .. }));
    }

    #[tokio::test]
    async fn test_current_conditions_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "12.9"))
            .and(query_param("lon", "77.6"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "test_api_key_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .expect(1)
            .mount(&server)
            .await;

        let current = client_for(&server)
            .current_conditions(Coordinates::new(12.9, 77.6))
            .await
            .unwrap();

        assert_eq!(current.place_name, "Bengaluru");
        assert_eq!(current.temperature, 27.4);
        assert_eq!(current.humidity, 61);
        assert_eq!(current.wind_direction, 250);
        assert_eq!(current.description, "few clouds");
        assert!(current.sunrise.is_some());
    }

    #[tokio::test]
    async fn test_forecast_and_air_quality_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": [
                    {"dt": 1_717_239_600, "main": {"temp": 25.0, "feels_like": 25.5, "humidity": 70},
                     "weather": [{"description": "light rain", "icon": "10d"}],
                     "wind": {"speed": 4.0}, "pop": 0.4},
                    {"dt": 1_717_228_800, "main": {"temp": 27.0, "feels_like": 27.5, "humidity": 60},
                     "weather": [{"description": "clouds", "icon": "03d"}],
                     "wind": {"speed": 3.0}}
                ],
                "city": {"timezone": 19800}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/air_pollution"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": [{"dt": 1_717_228_800, "main": {"aqi": 3},
                          "components": {"co": 230.3, "no": 0.1, "no2": 12.0, "o3": 60.1,
                                         "so2": 4.2, "pm2_5": 21.5, "pm10": 35.0, "nh3": 1.2}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let coordinates = Coordinates::new(12.9, 77.6);

        let forecast = client.forecast(coordinates).await.unwrap();
        assert_eq!(forecast.periods.len(), 2);
        assert_eq!(forecast.periods[0].temperature, 27.0);
        assert_eq!(forecast.periods[1].precipitation_probability, 0.4);
        assert_eq!(forecast.timezone_offset_seconds, 19800);

        let air = client.air_quality(coordinates).await.unwrap();
        assert_eq!(air.aqi, 3);
        assert_eq!(air.level, AqiLevel::Moderate);
        assert_eq!(air.pm2_5, 21.5);
    }

    #[tokio::test]
    async fn test_provider_message_preferred_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"cod": 401, "message": "Invalid API key."})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .current_conditions(Coordinates::new(1.0, 2.0))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DashboardError::Transport {
                message: "Invalid API key.".to_string(),
                status: Some(401)
            }
        );
    }

    #[tokio::test]
    async fn test_generic_message_when_body_has_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .forecast(Coordinates::new(1.0, 2.0))
            .await
            .unwrap_err();

        assert_eq!(err, DashboardError::transport_status("request failed", 503));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"weather": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/air_pollution"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let coordinates = Coordinates::new(1.0, 2.0);

        let err = client.current_conditions(coordinates).await.unwrap_err();
        assert!(matches!(err, DashboardError::Unexpected { .. }));

        let err = client.air_quality(coordinates).await.unwrap_err();
        assert!(matches!(err, DashboardError::Unexpected { .. }));
    }

    #[tokio::test]
    async fn test_search_cities_keeps_provider_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "Paris"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "Paris", "lat": 48.8566, "lon": 2.3522, "country": "FR"},
                {"name": "Paris", "lat": 33.6609, "lon": -95.5555, "country": "US", "state": "Texas"}
            ])))
            .mount(&server)
            .await;

        let cities = client_for(&server).search_cities("Paris", 5).await.unwrap();
        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].country, "FR");
        assert_eq!(cities[1].country, "US");
    }

    #[test]
    fn test_provider_message_extraction() {
        assert_eq!(
            wire::provider_message(r#"{"cod":"404","message":"city not found"}"#).as_deref(),
            Some("city not found")
        );
        assert_eq!(wire::provider_message(r#"{"cod":500,"message":""}"#), None);
        assert_eq!(wire::provider_message("<html>"), None);
    }
}
